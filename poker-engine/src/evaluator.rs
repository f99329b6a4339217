//! 7-card hand evaluation: ranks a hole-card pair plus the board into a
//! totally ordered score, so two hands compare with a single `>`.

use crate::card::Card;
use crate::error::MalformedHand;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Hand categories, ordered low to high. The discriminant is also the
/// band index used by `HandScore` (band width `BAND`), so `RoyalFlush`
/// scores are always >= `9 * BAND` and `HighCard` scores are always
/// < `BAND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    pub fn label(&self) -> &'static str {
        match self {
            HandCategory::HighCard => "High Card",
            HandCategory::OnePair => "One Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
            HandCategory::RoyalFlush => "Royal Flush",
        }
    }
}

/// Width of each category's numeric band. Comfortably larger than the
/// largest possible within-band lexicographic value (~1.4e9), so no
/// category can spill into its neighbor.
const BAND: u64 = 10_000_000_000;

/// A totally ordered hand score: `score(A) > score(B) <=> A beats B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandScore(pub u64);

fn encode_kickers(ranks: &[u8]) -> u64 {
    ranks
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, &r)| (r as u64) * 100u64.pow((4 - i) as u32))
        .sum()
}

fn score_of(category: HandCategory, kickers: &[u8]) -> HandScore {
    HandScore(category as u64 * BAND + encode_kickers(kickers))
}

/// The outcome of ranking a single 5-card hand: its category plus the
/// ordered rank values that break ties within that category.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FiveCardEval {
    category: HandCategory,
    kickers: Vec<u8>,
}

impl FiveCardEval {
    fn cmp_key(&self) -> (HandCategory, &[u8]) {
        (self.category, &self.kickers)
    }
}

/// Evaluates a hole-card pair plus 3-5 community cards and returns the
/// best possible 5-card hand's score and category. Fails with
/// `MalformedHand` if fewer than 5 distinct card positions are supplied.
pub fn evaluate(hole: (Card, Card), community: &[Card]) -> Result<(HandScore, HandCategory), MalformedHand> {
    let mut all = Vec::with_capacity(2 + community.len());
    all.push(hole.0);
    all.push(hole.1);
    all.extend_from_slice(community);

    if all.len() < 5 {
        return Err(MalformedHand);
    }

    let best = all
        .iter()
        .copied()
        .combinations(5)
        .map(|five| evaluate_five([five[0], five[1], five[2], five[3], five[4]]))
        .max_by(|a, b| a.cmp_key().cmp(&b.cmp_key()))
        .expect("at least one 5-card combination exists");

    Ok((score_of(best.category, &best.kickers), best.category))
}

fn evaluate_five(cards: [Card; 5]) -> FiveCardEval {
    let mut rank_counts: HashMap<u8, u8> = HashMap::new();
    for c in &cards {
        *rank_counts.entry(c.rank.value()).or_insert(0) += 1;
    }
    let is_flush = cards.iter().all(|c| c.suit == cards[0].suit);
    let straight_high = straight_high(&cards.iter().map(|c| c.rank.value()).collect::<Vec<_>>());

    if is_flush {
        if let Some(high) = straight_high {
            let category = if high == 14 {
                HandCategory::RoyalFlush
            } else {
                HandCategory::StraightFlush
            };
            return FiveCardEval { category, kickers: vec![high] };
        }
    }

    if let Some(quad) = find_count(&rank_counts, 4) {
        let kicker = rank_counts
            .keys()
            .copied()
            .filter(|&r| r != quad)
            .max()
            .unwrap_or(0);
        return FiveCardEval {
            category: HandCategory::FourOfAKind,
            kickers: vec![quad, kicker],
        };
    }

    if let Some(trip) = find_count(&rank_counts, 3) {
        if let Some(pair) = rank_counts
            .iter()
            .filter(|&(&r, &n)| r != trip && n >= 2)
            .map(|(&r, _)| r)
            .max()
        {
            return FiveCardEval {
                category: HandCategory::FullHouse,
                kickers: vec![trip, pair],
            };
        }
    }

    if is_flush {
        return FiveCardEval {
            category: HandCategory::Flush,
            kickers: desc_ranks(&cards),
        };
    }

    if let Some(high) = straight_high {
        return FiveCardEval {
            category: HandCategory::Straight,
            kickers: vec![high],
        };
    }

    if let Some(trip) = find_count(&rank_counts, 3) {
        let mut kickers = ranks_excluding(&rank_counts, &[trip]);
        kickers.truncate(2);
        return FiveCardEval {
            category: HandCategory::ThreeOfAKind,
            kickers: std::iter::once(trip).chain(kickers).collect(),
        };
    }

    let mut pairs: Vec<u8> = rank_counts
        .iter()
        .filter(|&(_, &n)| n == 2)
        .map(|(&r, _)| r)
        .collect();
    pairs.sort_unstable_by(|a, b| b.cmp(a));

    if pairs.len() >= 2 {
        let (high_pair, low_pair) = (pairs[0], pairs[1]);
        let kicker = ranks_excluding(&rank_counts, &[high_pair, low_pair])
            .into_iter()
            .next()
            .unwrap_or(0);
        return FiveCardEval {
            category: HandCategory::TwoPair,
            kickers: vec![high_pair, low_pair, kicker],
        };
    }

    if let Some(pair) = pairs.first().copied() {
        let mut kickers = ranks_excluding(&rank_counts, &[pair]);
        kickers.truncate(3);
        return FiveCardEval {
            category: HandCategory::OnePair,
            kickers: std::iter::once(pair).chain(kickers).collect(),
        };
    }

    FiveCardEval {
        category: HandCategory::HighCard,
        kickers: desc_ranks(&cards),
    }
}

fn find_count(counts: &HashMap<u8, u8>, n: u8) -> Option<u8> {
    counts.iter().filter(|&(_, &c)| c == n).map(|(&r, _)| r).max()
}

fn ranks_excluding(counts: &HashMap<u8, u8>, exclude: &[u8]) -> Vec<u8> {
    let mut ranks: Vec<u8> = counts
        .iter()
        .filter(|&(r, _)| !exclude.contains(r))
        .map(|(&r, _)| r)
        .collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));
    ranks
}

fn desc_ranks(cards: &[Card; 5]) -> Vec<u8> {
    let mut ranks: Vec<u8> = cards.iter().map(|c| c.rank.value()).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));
    ranks
}

/// Highest card of a 5-consecutive run among `ranks`, treating Ace as 1
/// as well as 14 so the wheel (A-2-3-4-5) is detected as a 5-high
/// straight rather than missed entirely.
fn straight_high(ranks: &[u8]) -> Option<u8> {
    let mut values: Vec<u8> = ranks.to_vec();
    if values.contains(&14) {
        values.push(1);
    }
    values.sort_unstable();
    values.dedup();

    let mut consecutive = 1;
    let mut max_value = 0u8;
    for i in 1..values.len() {
        if values[i] == values[i - 1] + 1 {
            consecutive += 1;
            if consecutive >= 5 {
                max_value = values[i];
            }
        } else {
            consecutive = 1;
        }
    }
    (max_value > 0).then_some(max_value)
}

/// Lexicographic comparison kept for callers that already have two
/// evaluated hands and just need a tie-break ordering (e.g. determining
/// remainder-chip order is unaffected, but side-pot eligibility checks
/// reuse this instead of re-deriving it from two `HandScore`s).
pub fn compare_kickers(a: &[u8], b: &[u8]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::parse_card;
    use rstest::rstest;

    fn hole(a: &str, b: &str) -> (Card, Card) {
        (parse_card(a), parse_card(b))
    }

    fn board(cards: &[&str]) -> Vec<Card> {
        cards.iter().map(|c| parse_card(c)).collect()
    }

    #[test]
    fn royal_flush_detection() {
        let (score, cat) = evaluate(hole("Ah", "Kh"), &board(&["Qh", "Jh", "Th", "2c", "3d"])).unwrap();
        assert_eq!(cat, HandCategory::RoyalFlush);
        assert!(score.0 >= 9 * BAND);
    }

    #[test]
    fn straight_flush_beats_four_of_a_kind() {
        let (score_a, cat_a) = evaluate(hole("9h", "Kh"), &board(&["Qh", "Jh", "Th", "2c", "3d"])).unwrap();
        let (score_b, cat_b) = evaluate(hole("As", "Ad"), &board(&["Ac", "Ah", "Kd", "2c", "3d"])).unwrap();
        assert_eq!(cat_a, HandCategory::StraightFlush);
        assert_eq!(cat_b, HandCategory::FourOfAKind);
        assert!(score_a > score_b);
    }

    #[test]
    fn wheel_straight_is_five_high() {
        let (score, cat) = evaluate(hole("Ac", "2d"), &board(&["3h", "4s", "5c", "Kh", "Qh"])).unwrap();
        assert_eq!(cat, HandCategory::Straight);
        let (six_high, _) = evaluate(hole("2c", "3d"), &board(&["4h", "5s", "6c", "Kh", "Qh"])).unwrap();
        assert!(score < six_high);
    }

    #[rstest]
    #[case("Ah", "Kd", &["Qc", "9s", "7h", "2c", "3d"], HandCategory::HighCard)]
    #[case("Ah", "Ad", &["Kc", "Qs", "Jh", "2c", "3d"], HandCategory::OnePair)]
    #[case("Ah", "Ad", &["Kc", "Ks", "Qh", "2c", "3d"], HandCategory::TwoPair)]
    #[case("Ah", "Ad", &["Ac", "Ks", "Qh", "2c", "3d"], HandCategory::ThreeOfAKind)]
    #[case("2c", "3d", &["4h", "5s", "6c", "Kh", "Ah"], HandCategory::Straight)]
    #[case("Ah", "2h", &["4h", "6h", "8h", "2c", "3d"], HandCategory::Flush)]
    #[case("Ah", "Ad", &["Ac", "Ks", "Kh", "2c", "3d"], HandCategory::FullHouse)]
    #[case("Ah", "Ad", &["Ac", "As", "Kh", "2c", "3d"], HandCategory::FourOfAKind)]
    fn band_boundaries_match_reference_thresholds(#[case] h1: &str, #[case] h2: &str, #[case] comm: &[&str], #[case] expected: HandCategory) {
        let (score, cat) = evaluate(hole(h1, h2), &board(comm)).unwrap();
        assert_eq!(cat, expected, "{h1}{h2} / {comm:?}");
        let band = expected as u64 * BAND;
        assert!(score.0 >= band && score.0 < band + BAND);
    }

    #[test]
    fn fewer_than_five_cards_is_malformed() {
        let err = evaluate(hole("Ah", "Kh"), &board(&["Qh", "Jh"]));
        assert_eq!(err, Err(MalformedHand));
    }

    #[test]
    fn two_pair_ties_break_on_kicker() {
        let (score_q, _) = evaluate(hole("Qd", "3c"), &board(&["Ah", "Ad", "Kc", "7c", "2s"])).unwrap();
        let (score_j, _) = evaluate(hole("Jd", "4c"), &board(&["Ah", "Ad", "Kc", "7c", "2s"])).unwrap();
        assert!(score_q > score_j);
    }
}
