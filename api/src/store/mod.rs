//! Database store for the bank simulation API
//!
//! ## Design Decisions
//!
//! ### Units of work
//! - Every mutating operation opens one `sqlx::Transaction`, threads it
//!   through the `_tx` helpers and commits once at the end. Returning early
//!   with an error drops the transaction, which rolls it back, so a failed
//!   operation never leaves partial rows behind.
//! - Helpers that take a `tx` never commit. The caller owns the boundary.
//!
//! ### Balance mutation
//! - `account::adjust_balance_tx` is the only statement that changes an
//!   account balance. It is a conditional update that refuses to take the
//!   available balance below zero, and the schema repeats the constraint.
//! - Operations touching more than one account lock the rows with
//!   `SELECT ... FOR UPDATE` in ascending id order before reading balances,
//!   so concurrent transfers serialize per account without deadlocking.
//!
//! ### Time Source Dependency
//! - Every timestamp written and every daily window is derived from the
//!   injected `TimeSource`, so tests can move across day boundaries.
//!
//! ### Type Safety
//! - Id newtypes and domain enums implement `sqlx::Type`, so they bind
//!   directly without reaching for the inner value.

pub mod account;
pub mod card;
pub mod fraud;
pub mod ledger;
pub mod payment;
pub mod transfer;
pub mod user;

use rust_decimal::{Decimal, dec};

/// Money columns are `NUMERIC(19, 4)`.
pub const MONEY_SCALE: u32 = 4;
/// Exclusive upper bound of a `NUMERIC(19, 4)` value.
pub const MONEY_BOUND: Decimal = dec!(1000000000000000);

/// Rejects amounts the money columns cannot store exactly. Postgres would
/// otherwise round each column on its own.
pub(crate) fn ensure_storable(amount: Decimal) -> Result<(), StoreError> {
    if amount.normalize().scale() > MONEY_SCALE || amount.abs() >= MONEY_BOUND
    {
        return Err(StoreError::AmountOutOfRange);
    }
    Ok(())
}

pub(crate) fn ensure_positive(amount: Decimal) -> Result<(), StoreError> {
    ensure_storable(amount)?;
    if amount <= Decimal::ZERO {
        return Err(StoreError::InvalidAmount);
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(amount: Decimal) -> Result<(), StoreError> {
    ensure_storable(amount)?;
    if amount < Decimal::ZERO {
        return Err(StoreError::InvalidAmount);
    }
    Ok(())
}

pub(crate) fn check_field(
    value: &str,
    max_len: usize,
) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::EmptyField);
    }
    if value.len() > max_len {
        return Err(StoreError::FieldTooLong);
    }
    Ok(())
}

pub(crate) fn check_optional_field(
    value: Option<&str>,
    max_len: usize,
) -> Result<(), StoreError> {
    match value {
        Some(v) if v.len() > max_len => Err(StoreError::FieldTooLong),
        _ => Ok(()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Account not found")]
    AccountNotFound,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Amount must be positive")]
    InvalidAmount,
    #[error("Amount must have at most 4 decimal places and stay below 10^15")]
    AmountOutOfRange,
    #[error("Resulting balance is out of range")]
    BalanceOutOfRange,
    #[error("Source and destination accounts must differ")]
    SameAccountTransfer,
    #[error("Account is not active")]
    AccountNotActive,
    #[error("A closed account cannot be reopened")]
    AccountClosed,
    #[error("Accounts hold different currencies")]
    CurrencyMismatch,
    #[error("Daily transfer limit exceeded. Remaining today: {remaining}")]
    DailyTransferLimitExceeded { remaining: Decimal },
    #[error("Daily withdrawal limit exceeded. Remaining today: {remaining}")]
    DailyWithdrawalLimitExceeded { remaining: Decimal },
    #[error("Reference number already used for a different transaction")]
    ReferenceConflict,
    #[error("Card application not found")]
    ApplicationNotFound,
    #[error("Card application is not pending")]
    ApplicationNotPending,
    #[error("Card not found")]
    CardNotFound,
    #[error("Card is not active")]
    CardNotActive,
    #[error("Insufficient card limit")]
    InsufficientCardLimit,
    #[error("Card {limit_type:?} limit exceeded")]
    CardSubLimitExceeded { limit_type: payloads::CardLimitType },
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid account number")]
    InvalidAccountNumber,
    #[error("Transaction not found")]
    TransactionNotFound,
    #[error("Risk score weight must be between 0 and 100")]
    InvalidRiskWeight,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Field too long")]
    FieldTooLong,
    #[error("Required field is empty")]
    EmptyField,
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl StoreError {
    /// Faults of the store itself, as opposed to a rejected request.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Database(_) | Self::UnexpectedError(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        // numeric_value_out_of_range
        if let sqlx::Error::Database(db_err) = &e
            && db_err.code().as_deref() == Some("22003")
        {
            return StoreError::BalanceOutOfRange;
        }
        StoreError::Database(e)
    }
}

impl From<jiff::Error> for StoreError {
    fn from(e: jiff::Error) -> Self {
        StoreError::UnexpectedError(e.into())
    }
}
