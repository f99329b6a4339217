//! Every error kind the server surfaces to a client, typed instead of
//! stringly matched. Handlers return `Result<_, ApiError>`; the router
//! converts the `Err` arm into the wire `{type:"error", error:"..."}`
//! shape and never lets a panic reach the connection.

use poker_engine::{LedgerError, TableError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    // Authentication
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account suspended")]
    AccountSuspended,
    #[error("unknown email")]
    UnknownEmail,
    #[error("wrong security answer")]
    WrongSecurityAnswer,
    #[error("password too short")]
    PasswordTooShort,
    #[error("email already in use")]
    EmailInUse,
    #[error("username already in use")]
    UsernameInUse,

    // Authorization
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("that action is not allowed in the current phase")]
    ActionNotAllowed,

    // Resource
    #[error("table not found")]
    TableNotFound,
    #[error("table is full")]
    TableFull,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("buy-in out of bounds")]
    BuyInOutOfBounds,
    #[error("daily limit exceeded")]
    DailyLimitExceeded,

    // Validation
    #[error("amount is below the minimum")]
    BelowMinimum,
    #[error("malformed message")]
    MalformedMessage,
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    // External
    #[error("payment provider error: {0}")]
    PaymentProvider(String),

    #[error("{0}")]
    Internal(String),
}

impl From<TableError> for ApiError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::TableFull => ApiError::TableFull,
            TableError::SeatTaken | TableError::NoSuchSeat => ApiError::ActionNotAllowed,
            TableError::PlayerNotFound => ApiError::ActionNotAllowed,
            TableError::NotYourTurn => ApiError::NotYourTurn,
            TableError::InvalidAction => ApiError::ActionNotAllowed,
            TableError::InsufficientChips => ApiError::InsufficientFunds,
            TableError::NotEnoughPlayers => ApiError::ActionNotAllowed,
            TableError::BuyInOutOfBounds => ApiError::BuyInOutOfBounds,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::WalletNotFound => ApiError::TableNotFound,
            LedgerError::TransactionNotFound => ApiError::MalformedMessage,
            LedgerError::NotPending => ApiError::ActionNotAllowed,
            LedgerError::InsufficientFunds => ApiError::InsufficientFunds,
            LedgerError::BelowMinimum => ApiError::BelowMinimum,
            LedgerError::InvalidDestination => ApiError::MalformedMessage,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}
