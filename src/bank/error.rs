//! Typed failure taxonomy for ledger operations.
//!
//! Business-rule rejections are expected outcomes and travel back to the
//! caller as values. Only infrastructure trouble (`StoreUnavailable`) and a
//! half-applied transfer (`ReconciliationRequired`) indicate a fault.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    /// The requested amount is non-positive or otherwise malformed.
    #[error("invalid amount")]
    InvalidAmount,

    /// The requested amount exceeds the spendable balance.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// The requested amount exceeds the deposit sub-balance.
    #[error("insufficient deposit")]
    InsufficientDeposit,

    /// The debt ceiling has been reached; no new borrowing until repaid.
    #[error("debt ceiling reached")]
    DebtCeilingReached,

    /// Repay requested with no outstanding debt.
    #[error("no outstanding debt")]
    NoDebt,

    #[error("account not found")]
    AccountNotFound,

    /// Transfer recipient does not exist.
    #[error("recipient not found")]
    RecipientNotFound,

    /// The account store timed out or errored; retryable by the caller.
    #[error("account store unavailable")]
    StoreUnavailable,

    /// A multi-account operation committed its debit but not its credit.
    /// Always surfaced to the operator, never swallowed.
    #[error("transfer requires reconciliation")]
    ReconciliationRequired,
}

pub type BankResult<T> = std::result::Result<T, BankError>;
