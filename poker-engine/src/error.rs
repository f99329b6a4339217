use thiserror::Error;

/// Fewer than 5 distinct card positions were supplied to the evaluator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a hand needs at least 5 cards to evaluate")]
pub struct MalformedHand;

/// Errors surfaced by `Table`'s public operations. The server crate
/// wraps these into the wire `{type:"error", error:"..."}` shape rather
/// than inventing a parallel enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table is full")]
    TableFull,
    #[error("seat is already taken")]
    SeatTaken,
    #[error("seat does not exist")]
    NoSuchSeat,
    #[error("player is not seated at this table")]
    PlayerNotFound,
    #[error("it is not this player's turn to act")]
    NotYourTurn,
    #[error("that action is not allowed right now")]
    InvalidAction,
    #[error("not enough chips for that action")]
    InsufficientChips,
    #[error("a hand cannot start: fewer than two eligible players")]
    NotEnoughPlayers,
    #[error("buy-in amount is outside the table's configured bounds")]
    BuyInOutOfBounds,
}
