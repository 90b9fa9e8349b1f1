//! Transfer engine and transaction records
//!
//! A transfer runs as a single unit of work:
//! 1. Lock both accounts (`SELECT ... FOR UPDATE`, ascending id order)
//! 2. Validate: source exists, sufficient available balance, destination
//!    exists, both active, same currency, daily transfer limit
//! 3. Debit the source and credit the destination via `adjust_balance_tx`
//! 4. Insert the Transfer transaction
//! 5. Record the paired Debit/Credit ledger rows
//!
//! and commits once. Any error before the commit drops the transaction, so a
//! failed transfer leaves no balance change, transaction row or ledger row.
//!
//! A caller-supplied reference number makes retries safe: a second request
//! with the same reference and the same parameters returns the original
//! transaction without moving money again.

use jiff::Timestamp;
use jiff_sqlx::ToSqlx;
use payloads::{
    AccountId, AccountStatus, Currency, ReferenceNumber, Transaction,
    TransactionId, TransactionStatus, TransactionType,
    requests::{self, DESCRIPTION_MAX_LEN},
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    StoreError, check_optional_field, ensure_positive,
    account::{adjust_balance_tx, lock_account_tx},
    ledger::record_transfer_entries_tx,
};
use crate::time::TimeSource;

/// Fields of a transaction row chosen by the caller. Everything else is
/// defaulted by the database or stamped from the time source.
pub(crate) struct NewTransaction<'a> {
    /// Generated when None.
    pub reference_number: Option<ReferenceNumber>,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub amount: Decimal,
    pub currency: Currency,
    pub transaction_type: TransactionType,
    pub description: Option<&'a str>,
}

/// Insert a Completed transaction.
pub(crate) async fn insert_transaction_tx(
    new: NewTransaction<'_>,
    time_source: &TimeSource,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Transaction, StoreError> {
    let reference_number = new
        .reference_number
        .unwrap_or_else(|| ReferenceNumber(Uuid::new_v4()));

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            reference_number,
            from_account_id,
            to_account_id,
            amount,
            currency,
            transaction_type,
            status,
            description,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(reference_number)
    .bind(new.from_account_id)
    .bind(new.to_account_id)
    .bind(new.amount)
    .bind(new.currency)
    .bind(new.transaction_type)
    .bind(TransactionStatus::Completed)
    .bind(new.description)
    .bind(time_source.now().to_sqlx())
    .fetch_one(&mut **tx)
    .await?;

    Ok(transaction)
}

/// Sum of completed outgoing transactions of one type since `since`.
pub(crate) async fn outgoing_total_since_tx(
    account_id: &AccountId,
    transaction_type: TransactionType,
    since: Timestamp,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Decimal, StoreError> {
    let total: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM transactions
        WHERE from_account_id = $1
          AND transaction_type = $2
          AND status = 'completed'
          AND created_at >= $3
        "#,
    )
    .bind(account_id)
    .bind(transaction_type)
    .bind(since.to_sqlx())
    .fetch_one(&mut **tx)
    .await?;
    Ok(total)
}

/// Move `amount` from one account to another.
pub async fn transfer(
    details: &requests::Transfer,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<Transaction, StoreError> {
    transfer_inner(details, time_source, pool)
        .await
        .inspect_err(|e| {
            if !e.is_fault() {
                tracing::warn!(
                    from = %details.from_account_id,
                    to = %details.to_account_id,
                    amount = %details.amount,
                    "transfer rejected: {e}"
                );
            }
        })
}

async fn transfer_inner(
    details: &requests::Transfer,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<Transaction, StoreError> {
    let requests::Transfer {
        from_account_id,
        to_account_id,
        amount,
        ..
    } = *details;

    ensure_positive(amount)?;
    if from_account_id == to_account_id {
        return Err(StoreError::SameAccountTransfer);
    }
    check_optional_field(details.description.as_deref(), DESCRIPTION_MAX_LEN)?;

    let mut tx = pool.begin().await?;

    // Lock in a fixed order so two opposing transfers can't deadlock
    let (first, second) = if from_account_id < to_account_id {
        (from_account_id, to_account_id)
    } else {
        (to_account_id, from_account_id)
    };
    let first_locked = lock_account_tx(&first, &mut tx).await?;
    let second_locked = lock_account_tx(&second, &mut tx).await?;
    let (from, to) = if first == from_account_id {
        (first_locked, second_locked)
    } else {
        (second_locked, first_locked)
    };

    // With both rows locked, a retry of the same reference is serialized
    // behind the original and sees its committed transaction.
    if let Some(reference) = details.reference
        && let Some(existing) =
            find_by_reference_tx(&reference, &mut tx).await?
    {
        return if is_same_transfer(&existing, details) {
            tracing::info!(
                transaction_id = %existing.id,
                reference = %reference,
                "transfer retry matched existing transaction"
            );
            Ok(existing)
        } else {
            Err(StoreError::ReferenceConflict)
        };
    }

    let from = from.ok_or(StoreError::AccountNotFound)?;
    if from.available_balance < amount {
        return Err(StoreError::InsufficientFunds);
    }
    let to = to.ok_or(StoreError::AccountNotFound)?;
    if from.status != AccountStatus::Active || to.status != AccountStatus::Active
    {
        return Err(StoreError::AccountNotActive);
    }
    if from.currency != to.currency {
        return Err(StoreError::CurrencyMismatch);
    }

    let sent_today = outgoing_total_since_tx(
        &from.id,
        TransactionType::Transfer,
        time_source.start_of_utc_day()?,
        &mut tx,
    )
    .await?;
    if sent_today + amount > from.daily_transfer_limit {
        return Err(StoreError::DailyTransferLimitExceeded {
            remaining: (from.daily_transfer_limit - sent_today)
                .max(Decimal::ZERO),
        });
    }

    adjust_balance_tx(&from.id, -amount, time_source, &mut tx).await?;
    adjust_balance_tx(&to.id, amount, time_source, &mut tx).await?;

    let transaction = insert_transaction_tx(
        NewTransaction {
            reference_number: details.reference,
            from_account_id: Some(from.id),
            to_account_id: Some(to.id),
            amount,
            currency: from.currency,
            transaction_type: TransactionType::Transfer,
            description: details.description.as_deref(),
        },
        time_source,
        &mut tx,
    )
    .await
    .map_err(|e| match e {
        // the same reference was used concurrently on another account pair
        StoreError::NotUnique(_) if details.reference.is_some() => {
            StoreError::ReferenceConflict
        }
        e => e,
    })?;

    record_transfer_entries_tx(
        &transaction.id,
        &from.id,
        &to.id,
        amount,
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        transaction_id = %transaction.id,
        reference = %transaction.reference_number,
        from = %from.id,
        to = %to.id,
        amount = %amount,
        "transfer completed"
    );
    Ok(transaction)
}

fn is_same_transfer(
    existing: &Transaction,
    details: &requests::Transfer,
) -> bool {
    existing.transaction_type == TransactionType::Transfer
        && existing.from_account_id == Some(details.from_account_id)
        && existing.to_account_id == Some(details.to_account_id)
        && existing.amount == details.amount
}

async fn find_by_reference_tx(
    reference: &ReferenceNumber,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Option<Transaction>, StoreError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE reference_number = $1",
    )
    .bind(reference)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(transaction)
}

pub async fn get_transaction(
    transaction_id: &TransactionId,
    pool: &PgPool,
) -> Result<Transaction, StoreError> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::TransactionNotFound)
}

/// Transactions where the account is source or destination, newest first.
pub async fn get_transactions_by_account(
    account_id: &AccountId,
    pool: &PgPool,
) -> Result<Vec<Transaction>, StoreError> {
    super::account::get_account(account_id, pool).await?;

    let transactions = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE from_account_id = $1 OR to_account_id = $1
        ORDER BY created_at DESC, seq DESC
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(transactions)
}
