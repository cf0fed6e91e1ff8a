use thiserror::Error;

use crate::types::UserId;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Amount must be a positive integer, got {0}")]
    InvalidAmount(i64),

    #[error("Insufficient balance: have {balance}, need {requested}")]
    InsufficientBalance { balance: i64, requested: i64 },

    #[error("Unknown coin package: {0}")]
    UnknownPackage(String),

    #[error("Unknown gift: {0}")]
    UnknownGift(String),

    #[error("User {0} cannot send a gift to themselves")]
    SelfGift(UserId),

    #[error("Balance overflow for user {0}")]
    BalanceOverflow(UserId),

    #[error("Ledger inconsistent for user {user_id}: balance {balance}, transactions sum to {replayed}")]
    LedgerInconsistent {
        user_id: UserId,
        balance: i64,
        replayed: i64,
    },
}

impl LedgerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::UnknownPackage(_) => "unknown_package",
            LedgerError::UnknownGift(_) => "unknown_gift",
            LedgerError::SelfGift(_) => "self_gift",
            LedgerError::BalanceOverflow(_) => "balance_overflow",
            LedgerError::LedgerInconsistent { .. } => "ledger_inconsistent",
        }
    }
}
