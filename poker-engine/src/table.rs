//! The per-table state machine: seats players, deals hands, enforces
//! betting rules, advances streets and resolves showdowns (including
//! layered side pots). Not reentrant by design — the server crate wraps
//! every public call in the table's exclusive lock; this module itself
//! does no locking or async work.

use crate::card::{Card, Deck};
use crate::error::TableError;
use crate::evaluator::{self, HandCategory, HandScore};
use crate::wallet::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type Chips = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Street {
    Waiting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Fold,
    Check,
    Call,
    /// The new per-street total the acting player wants to commit to
    /// (not an increment).
    Raise(Chips),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub user: UserId,
    pub display_name: String,
    pub stack: Chips,
    pub hole: Option<[Card; 2]>,
    pub current_bet: Chips,
    pub total_contributed: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub sitting_out: bool,
    pub connected: bool,
    pub last_action: Option<String>,
}

impl Seat {
    fn new(user: UserId, display_name: String, stack: Chips) -> Self {
        Self {
            user,
            display_name,
            stack,
            hole: None,
            current_bet: 0,
            total_contributed: 0,
            folded: false,
            all_in: false,
            sitting_out: false,
            connected: true,
            last_action: None,
        }
    }

    fn can_act(&self) -> bool {
        !self.folded && !self.all_in && !self.sitting_out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerShare {
    pub user: UserId,
    pub amount: Chips,
    pub category_label: String,
}

/// A redacted view of a single seat as a specific viewer should see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub user: UserId,
    pub display_name: String,
    pub seat: usize,
    pub chips: Chips,
    pub current_bet: Chips,
    pub cards: Vec<Option<Card>>,
    pub folded: bool,
    pub all_in: bool,
    pub sitting_out: bool,
    pub last_action: Option<String>,
}

/// A redacted snapshot of the whole table, as produced by `SnapshotFor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub table_id: String,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub max_seats: usize,
    pub players: Vec<PlayerView>,
    pub dealer_seat: usize,
    pub current_to_act: Option<usize>,
    pub pot: Chips,
    pub community: Vec<Card>,
    pub street: Street,
    pub current_bet: Chips,
    pub winners: Vec<WinnerShare>,
}

pub struct Table {
    pub id: String,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub max_seats: usize,
    pub creator: Option<UserId>,
    pub password: Option<String>,

    seats: Vec<Option<Seat>>,
    dealer_seat: usize,
    current_to_act: Option<usize>,
    community: Vec<Card>,
    pot: Chips,
    street: Street,
    current_bet: Chips,
    min_raise: Chips,
    acted: HashSet<usize>,
    /// Seats that already matched the bet before a short (non-reopening)
    /// all-in raised it further. They owe a call to stay in, but may not
    /// raise again until the next street re-opens action for everyone.
    raise_capped: HashSet<usize>,
    deck: Deck,
    winners: Vec<WinnerShare>,

    /// Bumped every time `current_to_act` changes. The server's turn
    /// timer tags an armed deadline with this value; a tick that fires
    /// against a stale token is a no-op, which is what makes timer
    /// cancellation race-free without actually aborting a sleeping task.
    pub turn_token: u64,
    pub action_timeout_secs: u64,
}

impl Table {
    pub fn new(
        id: impl Into<String>,
        max_seats: usize,
        small_blind: Chips,
        big_blind: Chips,
        min_buy_in: Chips,
        max_buy_in: Chips,
        creator: Option<UserId>,
        password: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            small_blind,
            big_blind,
            min_buy_in,
            max_buy_in,
            max_seats,
            creator,
            password,
            seats: (0..max_seats).map(|_| None).collect(),
            dealer_seat: 0,
            current_to_act: None,
            community: Vec::new(),
            pot: 0,
            street: Street::Waiting,
            current_bet: 0,
            min_raise: big_blind,
            acted: HashSet::new(),
            raise_capped: HashSet::new(),
            deck: Deck::new(),
            winners: Vec::new(),
            turn_token: 0,
            action_timeout_secs: 30,
        }
    }

    pub fn street(&self) -> Street {
        self.street
    }

    pub fn current_to_act_user(&self) -> Option<&UserId> {
        self.current_to_act.and_then(|i| self.seats[i].as_ref()).map(|s| &s.user)
    }

    fn find_seat(&self, user: &str) -> Option<usize> {
        self.seats
            .iter()
            .position(|s| s.as_ref().map(|s| s.user == user) == Some(true))
    }

    fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    fn eligible_seat_indices(&self) -> Vec<usize> {
        (0..self.max_seats)
            .filter(|&i| self.seats[i].as_ref().is_some_and(|s| !s.sitting_out && s.stack > 0))
            .collect()
    }

    /// Next occupied, non-sitting-out seat clockwise from `idx`, used for
    /// dealer rotation and blind posting. Walks every seat regardless of
    /// whether the previous dealer seat is still occupied.
    fn next_occupied_from(&self, idx: usize) -> Option<usize> {
        for step in 1..=self.max_seats {
            let i = (idx + step) % self.max_seats;
            if self.seats[i].as_ref().is_some_and(|s| !s.sitting_out) {
                return Some(i);
            }
        }
        None
    }

    fn first_actable_seat_from(&self, idx: usize) -> Option<usize> {
        for step in 1..=self.max_seats {
            let i = (idx + step) % self.max_seats;
            if self.seats[i].as_ref().is_some_and(Seat::can_act) {
                return Some(i);
            }
        }
        None
    }

    fn bump_turn_token(&mut self) {
        self.turn_token += 1;
    }

    // ---- public operations --------------------------------------------

    pub fn add_player(
        &mut self,
        user: UserId,
        display_name: String,
        amount: Chips,
        seat: Option<usize>,
    ) -> Result<usize, TableError> {
        if self.occupied_count() >= self.max_seats {
            return Err(TableError::TableFull);
        }
        if amount < self.min_buy_in || amount > self.max_buy_in {
            return Err(TableError::BuyInOutOfBounds);
        }
        let idx = match seat {
            Some(s) => {
                if s >= self.max_seats {
                    return Err(TableError::NoSuchSeat);
                }
                if self.seats[s].is_some() {
                    return Err(TableError::SeatTaken);
                }
                s
            }
            None => self
                .seats
                .iter()
                .position(|s| s.is_none())
                .ok_or(TableError::TableFull)?,
        };
        self.seats[idx] = Some(Seat::new(user, display_name, amount));

        if self.street == Street::Waiting && self.eligible_seat_indices().len() >= 2 {
            let _ = self.start_hand();
        }
        Ok(idx)
    }

    pub fn remove_player(&mut self, user: &str) -> Result<Chips, TableError> {
        let idx = self.find_seat(user).ok_or(TableError::PlayerNotFound)?;
        let live = self.street != Street::Waiting && self.street != Street::Showdown;

        if live {
            let already_folded = self.seats[idx].as_ref().unwrap().folded;
            if !already_folded {
                self.force_fold(idx);
                self.advance_after_action(idx);
            }
        }

        let seat = self.seats[idx].take().ok_or(TableError::PlayerNotFound)?;
        if self.current_to_act == Some(idx) {
            self.current_to_act = None;
        }
        if self.occupied_count() < 2 {
            self.reset_to_waiting();
        }
        Ok(seat.stack)
    }

    pub fn sit_out(&mut self, user: &str) -> Result<(), TableError> {
        let idx = self.find_seat(user).ok_or(TableError::PlayerNotFound)?;
        let seat = self.seats[idx].as_mut().unwrap();
        if seat.sitting_out {
            return Ok(());
        }
        seat.sitting_out = true;
        let holding_action = self.current_to_act == Some(idx);
        let live = self.street != Street::Waiting && self.street != Street::Showdown;
        if live && holding_action {
            self.force_fold(idx);
            self.advance_after_action(idx);
        }
        Ok(())
    }

    pub fn sit_in(&mut self, user: &str) -> Result<(), TableError> {
        let idx = self.find_seat(user).ok_or(TableError::PlayerNotFound)?;
        self.seats[idx].as_mut().unwrap().sitting_out = false;
        Ok(())
    }

    pub fn mark_connected(&mut self, user: &str, connected: bool) -> Result<(), TableError> {
        let idx = self.find_seat(user).ok_or(TableError::PlayerNotFound)?;
        self.seats[idx].as_mut().unwrap().connected = connected;
        Ok(())
    }

    pub fn can_start_hand(&self) -> bool {
        self.street == Street::Waiting && self.eligible_seat_indices().len() >= 2
    }

    /// Starts a fresh hand: rotates the dealer, reshuffles, deals hole
    /// cards, posts blinds, and sets the opening actor. Called
    /// automatically from `add_player` and by the server after the
    /// post-showdown restart delay.
    pub fn start_hand(&mut self) -> Result<(), TableError> {
        let eligible = self.eligible_seat_indices();
        if eligible.len() < 2 {
            return Err(TableError::NotEnoughPlayers);
        }

        self.dealer_seat = self.next_occupied_from(self.dealer_seat).unwrap_or(self.dealer_seat);

        self.deck = Deck::new();
        self.deck.shuffle();
        self.community.clear();
        self.pot = 0;
        self.street = Street::Preflop;
        self.acted.clear();
        self.raise_capped.clear();
        self.winners.clear();
        for seat_opt in self.seats.iter_mut() {
            if let Some(seat) = seat_opt {
                seat.current_bet = 0;
                seat.total_contributed = 0;
                seat.folded = false;
                seat.all_in = false;
                seat.last_action = None;
                seat.hole = None;
            }
        }

        for _ in 0..2 {
            for &i in &eligible {
                if let Some(card) = self.deck.deal() {
                    let seat = self.seats[i].as_mut().unwrap();
                    match &mut seat.hole {
                        Some(hole) => hole[1] = card,
                        None => seat.hole = Some([card, card]),
                    }
                }
            }
        }

        let heads_up = eligible.len() == 2;
        let (sb_idx, bb_idx) = if heads_up {
            (self.dealer_seat, self.next_occupied_from(self.dealer_seat).unwrap())
        } else {
            let sb = self.next_occupied_from(self.dealer_seat).unwrap();
            let bb = self.next_occupied_from(sb).unwrap();
            (sb, bb)
        };
        self.post_blind(sb_idx, self.small_blind);
        self.post_blind(bb_idx, self.big_blind);

        self.current_bet = self.big_blind;
        self.min_raise = self.big_blind;
        self.current_to_act = self.first_actable_seat_from(bb_idx);
        self.bump_turn_token();
        Ok(())
    }

    fn post_blind(&mut self, idx: usize, amount: Chips) {
        let seat = self.seats[idx].as_mut().unwrap();
        let paid = amount.min(seat.stack);
        seat.stack -= paid;
        seat.current_bet += paid;
        seat.total_contributed += paid;
        if seat.stack == 0 {
            seat.all_in = true;
        }
        self.pot += paid;
    }

    pub fn handle_action(&mut self, user: &str, action: Action) -> Result<(), TableError> {
        let idx = self.find_seat(user).ok_or(TableError::PlayerNotFound)?;
        if self.street == Street::Waiting || self.street == Street::Showdown {
            return Err(TableError::InvalidAction);
        }
        if self.current_to_act != Some(idx) {
            return Err(TableError::NotYourTurn);
        }
        {
            let seat = self.seats[idx].as_ref().unwrap();
            if seat.folded || seat.all_in {
                return Err(TableError::InvalidAction);
            }
        }

        match action {
            Action::Fold => self.force_fold(idx),
            Action::Check => self.do_check(idx)?,
            Action::Call => self.do_call(idx)?,
            Action::Raise(level) => self.do_raise(idx, level)?,
        }

        self.advance_after_action(idx);
        Ok(())
    }

    /// Reduces a forced timeout to `check` if legal, else `fold`; marks
    /// the timed-out player sitting-out. No-op if `current_to_act` has
    /// already moved on (stale timer tick).
    pub fn force_timeout(&mut self, user: &str) -> Result<(), TableError> {
        let idx = self.find_seat(user).ok_or(TableError::PlayerNotFound)?;
        if self.current_to_act != Some(idx) {
            return Ok(());
        }
        if self.do_check(idx).is_err() {
            self.force_fold(idx);
        }
        self.seats[idx].as_mut().unwrap().sitting_out = true;
        self.advance_after_action(idx);
        Ok(())
    }

    fn force_fold(&mut self, idx: usize) {
        let seat = self.seats[idx].as_mut().unwrap();
        seat.folded = true;
        seat.hole = None;
        seat.last_action = Some("FOLD".to_string());
        self.acted.insert(idx);
    }

    fn do_check(&mut self, idx: usize) -> Result<(), TableError> {
        let seat = self.seats[idx].as_ref().unwrap();
        if seat.current_bet != self.current_bet {
            return Err(TableError::InvalidAction);
        }
        self.seats[idx].as_mut().unwrap().last_action = Some("CHECK".to_string());
        self.acted.insert(idx);
        Ok(())
    }

    fn do_call(&mut self, idx: usize) -> Result<(), TableError> {
        let seat = self.seats[idx].as_ref().unwrap();
        if seat.current_bet >= self.current_bet {
            return Err(TableError::InvalidAction);
        }
        let to_call = self.current_bet - seat.current_bet;
        self.place(idx, to_call);
        self.seats[idx].as_mut().unwrap().last_action = Some("CALL".to_string());
        self.acted.insert(idx);
        Ok(())
    }

    fn do_raise(&mut self, idx: usize, level: Chips) -> Result<(), TableError> {
        if self.raise_capped.contains(&idx) {
            return Err(TableError::InvalidAction);
        }
        let (seat_bet, seat_stack) = {
            let seat = self.seats[idx].as_ref().unwrap();
            (seat.current_bet, seat.stack)
        };
        if level <= self.current_bet {
            return Err(TableError::InvalidAction);
        }
        let is_short_all_in = level == seat_bet + seat_stack;
        let diff = level - self.current_bet;
        if diff < self.min_raise && !is_short_all_in {
            return Err(TableError::InvalidAction);
        }
        let add = level - seat_bet;
        if add > seat_stack {
            return Err(TableError::InsufficientChips);
        }
        self.place(idx, add);

        let reopens = diff >= self.min_raise;
        self.current_bet = level;
        if reopens {
            self.min_raise = diff;
            self.acted.clear();
            self.raise_capped.clear();
        } else {
            // A short all-in raises the bet without reopening action: seats
            // that already matched the old level now owe a call, not a
            // fresh chance to raise.
            self.raise_capped.extend(self.acted.iter().copied());
            self.acted.clear();
        }
        self.acted.insert(idx);
        self.seats[idx].as_mut().unwrap().last_action = Some("RAISE".to_string());
        Ok(())
    }

    fn place(&mut self, idx: usize, amount: Chips) {
        let seat = self.seats[idx].as_mut().unwrap();
        let pay = amount.min(seat.stack);
        seat.stack -= pay;
        seat.current_bet += pay;
        seat.total_contributed += pay;
        if seat.stack == 0 {
            seat.all_in = true;
        }
        self.pot += pay;
    }

    /// Shared post-action hook: checks for a single survivor, then for
    /// round completion (advancing the street), then moves the turn
    /// pointer if it still belongs to the seat that just acted.
    fn advance_after_action(&mut self, actor_idx: usize) {
        if self.check_single_survivor() {
            return;
        }
        if self.round_is_complete() {
            self.advance_street();
            return;
        }
        let still_actors_turn = self.current_to_act == Some(actor_idx);
        let pointer_stale = self.current_to_act.is_none_or(|ct| !self.seats[ct].as_ref().is_some_and(Seat::can_act));
        if still_actors_turn || pointer_stale {
            self.current_to_act = self.first_actable_seat_from(actor_idx);
            self.bump_turn_token();
        }
    }

    fn check_single_survivor(&mut self) -> bool {
        let alive: Vec<usize> = (0..self.max_seats)
            .filter(|&i| self.seats[i].as_ref().is_some_and(|s| !s.folded))
            .collect();
        if alive.len() <= 1 {
            if let Some(&winner) = alive.first() {
                self.finish_hand_single_survivor(winner);
            }
            true
        } else {
            false
        }
    }

    fn finish_hand_single_survivor(&mut self, idx: usize) {
        let amount = self.pot;
        self.pot = 0;
        let seat = self.seats[idx].as_mut().unwrap();
        seat.stack += amount;
        self.winners = vec![WinnerShare {
            user: seat.user.clone(),
            amount,
            category_label: "Opponents Folded".to_string(),
        }];
        self.street = Street::Showdown;
        self.current_to_act = None;
    }

    fn round_is_complete(&self) -> bool {
        let eligible: Vec<usize> = (0..self.max_seats)
            .filter(|&i| self.seats[i].as_ref().is_some_and(Seat::can_act))
            .collect();
        if eligible.is_empty() {
            return true;
        }
        eligible
            .iter()
            .all(|&i| self.seats[i].as_ref().unwrap().current_bet == self.current_bet && self.acted.contains(&i))
    }

    fn advance_street(&mut self) {
        loop {
            for seat_opt in self.seats.iter_mut() {
                if let Some(seat) = seat_opt {
                    seat.current_bet = 0;
                    seat.last_action = None;
                }
            }
            self.current_bet = 0;
            self.min_raise = self.big_blind;
            self.acted.clear();
            self.raise_capped.clear();

            match self.street {
                Street::Preflop => {
                    self.community.extend(self.deck.deal_n(3));
                    self.street = Street::Flop;
                }
                Street::Flop => {
                    self.community.extend(self.deck.deal_n(1));
                    self.street = Street::Turn;
                }
                Street::Turn => {
                    self.community.extend(self.deck.deal_n(1));
                    self.street = Street::River;
                }
                Street::River => {
                    self.street = Street::Showdown;
                }
                Street::Waiting | Street::Showdown => return,
            }

            if self.street == Street::Showdown {
                self.resolve_showdown();
                return;
            }

            match self.first_actable_seat_from(self.dealer_seat) {
                Some(idx) => {
                    self.current_to_act = Some(idx);
                    self.bump_turn_token();
                    return;
                }
                None => continue, // everyone left is all-in: deal the rest and keep going
            }
        }
    }

    /// Partitions total hand contributions into layered side pots and
    /// pays each layer to its best eligible hand. Ties split the layer
    /// evenly, with any remainder awarded one chip at a time starting
    /// clockwise from the dealer.
    fn resolve_showdown(&mut self) {
        let mut remaining: Vec<(usize, Chips)> = (0..self.max_seats)
            .filter_map(|i| {
                self.seats[i]
                    .as_ref()
                    .filter(|s| s.total_contributed > 0)
                    .map(|s| (i, s.total_contributed))
            })
            .collect();

        let mut layers: Vec<(Chips, Vec<usize>)> = Vec::new();
        while !remaining.is_empty() {
            let min_amount = remaining.iter().map(|&(_, a)| a).min().unwrap();
            let participants: Vec<usize> = remaining.iter().map(|&(i, _)| i).collect();
            layers.push((min_amount * participants.len() as Chips, participants));
            remaining = remaining
                .into_iter()
                .filter_map(|(i, a)| (a > min_amount).then_some((i, a - min_amount)))
                .collect();
        }

        let mut scores: Vec<Option<(HandScore, HandCategory)>> = vec![None; self.max_seats];
        for i in 0..self.max_seats {
            if let Some(seat) = &self.seats[i] {
                if !seat.folded {
                    if let Some([a, b]) = seat.hole {
                        scores[i] = evaluator::evaluate((a, b), &self.community).ok();
                    }
                }
            }
        }

        self.winners.clear();
        for (amount, participants) in layers {
            if amount == 0 {
                continue;
            }
            let eligible: Vec<usize> = participants
                .into_iter()
                .filter(|&i| self.seats[i].as_ref().is_some_and(|s| !s.folded))
                .collect();
            let best = eligible.iter().filter_map(|&i| scores[i].map(|(s, _)| s)).max();
            let Some(best) = best else { continue };
            let mut winners: Vec<usize> = eligible
                .into_iter()
                .filter(|&i| scores[i].map(|(s, _)| s) == Some(best))
                .collect();
            winners.sort_by_key(|&i| (i + self.max_seats - (self.dealer_seat + 1) % self.max_seats) % self.max_seats);

            let share = amount / winners.len() as Chips;
            let mut remainder = amount - share * winners.len() as Chips;
            for &w in &winners {
                let mut pay = share;
                if remainder > 0 {
                    pay += 1;
                    remainder -= 1;
                }
                let category_label = scores[w].map(|(_, c)| c.label().to_string()).unwrap_or_default();
                let seat = self.seats[w].as_mut().unwrap();
                seat.stack += pay;
                self.winners.push(WinnerShare {
                    user: seat.user.clone(),
                    amount: pay,
                    category_label,
                });
            }
        }
        self.pot = 0;
    }

    fn reset_to_waiting(&mut self) {
        self.street = Street::Waiting;
        self.pot = 0;
        self.community.clear();
        self.current_to_act = None;
        self.acted.clear();
        self.raise_capped.clear();
        for seat_opt in self.seats.iter_mut() {
            if let Some(seat) = seat_opt {
                seat.current_bet = 0;
                seat.total_contributed = 0;
                seat.folded = false;
                seat.all_in = false;
                seat.last_action = None;
                seat.hole = None;
            }
        }
    }

    /// Produces a redacted view: `viewer`'s own hole cards are visible,
    /// as are any non-folded player's cards once the street is
    /// `Showdown`. Pure and side-effect free.
    pub fn snapshot_for(&self, viewer: Option<&str>) -> TableSnapshot {
        let players = (0..self.max_seats)
            .filter_map(|i| {
                self.seats[i].as_ref().map(|seat| {
                    let reveal = viewer == Some(seat.user.as_str())
                        || (self.street == Street::Showdown && !seat.folded);
                    let cards = match (reveal, seat.hole) {
                        (true, Some(hole)) => vec![Some(hole[0]), Some(hole[1])],
                        (_, Some(_)) => vec![None, None],
                        (_, None) => vec![],
                    };
                    PlayerView {
                        user: seat.user.clone(),
                        display_name: seat.display_name.clone(),
                        seat: i,
                        chips: seat.stack,
                        current_bet: seat.current_bet,
                        cards,
                        folded: seat.folded,
                        all_in: seat.all_in,
                        sitting_out: seat.sitting_out,
                        last_action: seat.last_action.clone(),
                    }
                })
            })
            .collect();

        TableSnapshot {
            table_id: self.id.clone(),
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            min_buy_in: self.min_buy_in,
            max_buy_in: self.max_buy_in,
            max_seats: self.max_seats,
            players,
            dealer_seat: self.dealer_seat,
            current_to_act: self.current_to_act,
            pot: self.pot,
            community: self.community.clone(),
            street: self.street,
            current_bet: self.current_bet,
            winners: self.winners.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn seat_at(&self, idx: usize) -> Option<&Seat> {
        self.seats[idx].as_ref()
    }

    #[cfg(test)]
    pub(crate) fn set_seat_hole(&mut self, idx: usize, hole: [Card; 2]) {
        self.seats[idx].as_mut().unwrap().hole = Some(hole);
    }

    #[cfg(test)]
    pub(crate) fn set_community(&mut self, cards: Vec<Card>) {
        self.community = cards;
    }

    #[cfg(test)]
    pub(crate) fn force_street(&mut self, street: Street) {
        self.street = street;
    }

    #[cfg(test)]
    pub(crate) fn pot(&self) -> Chips {
        self.pot
    }

    #[cfg(test)]
    pub(crate) fn dealer_seat(&self) -> usize {
        self.dealer_seat
    }

    #[cfg(test)]
    pub(crate) fn set_total_contributed(&mut self, idx: usize, amount: Chips) {
        self.seats[idx].as_mut().unwrap().total_contributed = amount;
    }

    #[cfg(test)]
    pub(crate) fn set_pot(&mut self, amount: Chips) {
        self.pot = amount;
    }

    #[cfg(test)]
    pub(crate) fn resolve_showdown_for_test(&mut self) {
        self.resolve_showdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::parse_card;

    fn seated(small_blind: Chips, big_blind: Chips, stacks: &[Chips]) -> Table {
        let mut t = Table::new("t1", 6, small_blind, big_blind, 0, Chips::MAX, None, None);
        for (i, &stack) in stacks.iter().enumerate() {
            t.add_player(format!("u{i}"), format!("User {i}"), stack, None).unwrap();
        }
        t
    }

    #[test]
    fn heads_up_dealer_posts_small_blind_and_opens_preflop() {
        let t = seated(5, 10, &[1000, 1000]);
        assert_eq!(t.street, Street::Preflop);
        assert_eq!(t.pot, 15);
        // Heads-up: dealer (seat 0) posts SB, seat 1 posts BB, action opens on the dealer.
        assert_eq!(t.current_to_act, Some(0));
    }

    #[test]
    fn short_all_in_raise_does_not_reopen_action_for_matched_callers() {
        // u0's stack is sized so it goes all-in on the flop for less than a
        // full raise over the 20 level set up below.
        let mut t = seated(5, 10, &[40, 1000, 1000]);
        // Preflop, 3-handed: seat0=dealer(nothing posted), seat1=SB, seat2=BB, action on seat0.
        t.handle_action("u0", Action::Call).unwrap(); // matches BB of 10, stack 40 -> 30
        t.handle_action("u1", Action::Call).unwrap(); // SB completes to 10
        t.handle_action("u2", Action::Check).unwrap(); // BB closes the round
        assert_eq!(t.street, Street::Flop);

        // Flop: seat1 acts first (first actable clockwise from dealer=0).
        let bettor = t.current_to_act.unwrap();
        t.handle_action(&format!("u{bettor}"), Action::Raise(20)).unwrap();
        let next = t.current_to_act.unwrap();
        t.handle_action(&format!("u{next}"), Action::Call).unwrap();

        // u0 is left with 30 chips and is the last to act; going all-in for
        // their whole stack raises the level from 20 to 30, a 10-chip raise
        // short of the 20-chip min-raise, so it must not reopen action.
        let third = t.current_to_act.unwrap();
        assert_eq!(third, 0);
        let stack_left = t.seats[third].as_ref().unwrap().stack;
        assert_eq!(stack_left, 30);
        let result = t.handle_action(&format!("u{third}"), Action::Raise(stack_left));
        assert!(result.is_ok());
        assert!(t.seats[third].as_ref().unwrap().all_in);

        // The two players who already matched 20 may only call the extra 10,
        // not raise again, since this all-in never reopened the betting.
        let capped = t.current_to_act.unwrap();
        assert!(capped == bettor || capped == next);
        let blocked = t.handle_action(&format!("u{capped}"), Action::Raise(40));
        assert_eq!(blocked, Err(TableError::InvalidAction));
        t.handle_action(&format!("u{capped}"), Action::Call).unwrap();

        let last = t.current_to_act.unwrap();
        assert!(last == bettor || last == next);
        assert_ne!(last, capped);
        t.handle_action(&format!("u{last}"), Action::Call).unwrap();

        assert_eq!(t.street, Street::Turn);
    }

    #[test]
    fn single_survivor_wins_whole_pot_and_conserves_chips() {
        let mut t = seated(5, 10, &[1000, 1000]);
        let total_before: Chips = (0..2).map(|i| t.seats[i].as_ref().unwrap().stack).sum::<Chips>() + t.pot;
        t.handle_action("u0", Action::Fold).unwrap();
        assert_eq!(t.street, Street::Showdown);
        let total_after: Chips = (0..2).map(|i| t.seats[i].as_ref().unwrap().stack).sum();
        assert_eq!(total_before, total_after);
        assert_eq!(t.winners[0].category_label, "Opponents Folded");
    }

    #[test]
    fn two_player_full_hand_conserves_total_chips() {
        let mut t = seated(5, 10, &[1000, 1000]);
        // Deterministic board/hole via the test-only setters, bypassing the shuffled deck.
        t.set_seat_hole(0, [parse_card("As"), parse_card("Ah")]);
        t.set_seat_hole(1, [parse_card("Kd"), parse_card("Kc")]);

        t.handle_action("u0", Action::Call).unwrap();
        t.handle_action("u1", Action::Check).unwrap();
        assert_eq!(t.street, Street::Flop);
        t.handle_action("u1", Action::Check).unwrap();
        t.handle_action("u0", Action::Check).unwrap();
        assert_eq!(t.street, Street::Turn);
        t.handle_action("u1", Action::Check).unwrap();
        t.handle_action("u0", Action::Check).unwrap();
        assert_eq!(t.street, Street::River);
        t.handle_action("u1", Action::Check).unwrap();
        t.handle_action("u0", Action::Check).unwrap();
        assert_eq!(t.street, Street::Showdown);

        let total: Chips = (0..2).map(|i| t.seats[i].as_ref().unwrap().stack).sum();
        assert_eq!(total, 2000);
        assert!(t.seats[0].as_ref().unwrap().stack > t.seats[1].as_ref().unwrap().stack);
    }

    #[test]
    fn side_pot_layering_pays_the_best_hand_in_each_layer() {
        let mut t = Table::new("t1", 6, 1, 2, 0, Chips::MAX, None, None);
        t.add_player("a".into(), "A".into(), 0, None).unwrap_err(); // below min not an issue here, skip
        // Build the scenario directly rather than through betting.
        let mut t = Table::new("t1", 6, 1, 2, 0, Chips::MAX, None, None);
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            t.seats[i] = Some(Seat::new(name.to_string(), name.to_string(), 0));
        }
        t.set_total_contributed(0, 50);
        t.set_total_contributed(1, 100);
        t.set_total_contributed(2, 100);
        t.set_pot(250);
        t.set_community(vec![parse_card("2h"), parse_card("5s"), parse_card("Jd"), parse_card("Qc"), parse_card("Kh")]);
        t.set_seat_hole(0, [parse_card("2c"), parse_card("3c")]); // pair of 2s
        t.set_seat_hole(1, [parse_card("7c"), parse_card("7d")]); // pair of 7s
        t.set_seat_hole(2, [parse_card("8c"), parse_card("8d")]); // pair of 8s, best hand throughout
        t.resolve_showdown_for_test();
        assert_eq!(t.seat_at(2).unwrap().stack, 250);
    }

    #[test]
    fn snapshot_hides_opponent_cards_until_showdown() {
        let mut t = seated(5, 10, &[1000, 1000]);
        let viewer0 = t.snapshot_for(Some("u0"));
        let me = viewer0.players.iter().find(|p| p.user == "u0").unwrap();
        let opp = viewer0.players.iter().find(|p| p.user == "u1").unwrap();
        assert_eq!(me.cards.len(), 2);
        assert!(me.cards.iter().all(|c| c.is_some()));
        assert!(opp.cards.iter().all(|c| c.is_none()));
    }

    #[test]
    fn dealer_rotates_to_next_eligible_seat_regardless_of_vacated_seats() {
        let mut t = seated(5, 10, &[1000, 1000, 1000]);
        let first_dealer = t.dealer_seat();
        // finish the hand quickly via folds so a new hand can start
        t.handle_action(&format!("u{}", t.current_to_act.unwrap()), Action::Fold).unwrap();
        while t.street != Street::Showdown {
            t.handle_action(&format!("u{}", t.current_to_act.unwrap()), Action::Fold).unwrap();
        }
        t.remove_player(&format!("u{first_dealer}")).unwrap();
        t.start_hand().unwrap();
        assert_ne!(t.dealer_seat(), first_dealer);
    }
}
