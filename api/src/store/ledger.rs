//! General ledger.
//!
//! Every balance movement writes ledger rows in the same unit of work as the
//! balance change: a transfer writes one Debit row on the source and one
//! Credit row on the destination, deposits, withdrawals and adjustments
//! write a single row. Rows are keyed uniquely by `(transaction_id,
//! entry_type)` and inserted with `ON CONFLICT DO NOTHING`, so recording a
//! transaction twice is harmless. The backfill pass relies on this to repair
//! transfers that are missing either side.

use jiff_sqlx::ToSqlx;
use payloads::{
    AccountId, LedgerEntry, LedgerEntryType, Transaction, TransactionId,
    responses::LedgerBackfillResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::StoreError;
use crate::{telemetry::log_error, time::TimeSource};

const TRANSFER_DEBIT_DESCRIPTION: &str = "Transfer sent";
const TRANSFER_CREDIT_DESCRIPTION: &str = "Transfer received";

/// Write the Debit row for `from` and the Credit row for `to`.
///
/// Returns the number of rows actually inserted: 2 on first recording, 0 when
/// both sides already exist.
pub async fn record_transfer_entries_tx(
    transaction_id: &TransactionId,
    from_account_id: &AccountId,
    to_account_id: &AccountId,
    amount: Decimal,
    time_source: &TimeSource,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<u64, StoreError> {
    let written = sqlx::query(
        r#"
        INSERT INTO general_ledger (
            transaction_id,
            account_id,
            entry_type,
            debit_amount,
            credit_amount,
            description,
            created_at
        )
        VALUES
            ($1, $2, 'debit', $4, 0, $5, $7),
            ($1, $3, 'credit', 0, $4, $6, $7)
        ON CONFLICT (transaction_id, entry_type) DO NOTHING
        "#,
    )
    .bind(transaction_id)
    .bind(from_account_id)
    .bind(to_account_id)
    .bind(amount)
    .bind(TRANSFER_DEBIT_DESCRIPTION)
    .bind(TRANSFER_CREDIT_DESCRIPTION)
    .bind(time_source.now().to_sqlx())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(written)
}

/// Write one side of a movement that only touches a single internal account.
pub async fn record_single_entry_tx(
    transaction_id: &TransactionId,
    account_id: &AccountId,
    entry_type: LedgerEntryType,
    amount: Decimal,
    description: &str,
    time_source: &TimeSource,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<u64, StoreError> {
    let (debit, credit) = match entry_type {
        LedgerEntryType::Debit => (amount, Decimal::ZERO),
        LedgerEntryType::Credit => (Decimal::ZERO, amount),
    };

    let written = sqlx::query(
        r#"
        INSERT INTO general_ledger (
            transaction_id,
            account_id,
            entry_type,
            debit_amount,
            credit_amount,
            description,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (transaction_id, entry_type) DO NOTHING
        "#,
    )
    .bind(transaction_id)
    .bind(account_id)
    .bind(entry_type)
    .bind(debit)
    .bind(credit)
    .bind(description)
    .bind(time_source.now().to_sqlx())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(written)
}

pub async fn get_entries_by_transaction(
    transaction_id: &TransactionId,
    pool: &PgPool,
) -> Result<Vec<LedgerEntry>, StoreError> {
    // distinguish "no entries" from "no such transaction"
    super::transfer::get_transaction(transaction_id, pool).await?;

    let entries = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT * FROM general_ledger
        WHERE transaction_id = $1
        ORDER BY seq
        "#,
    )
    .bind(transaction_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Entries for an account, newest first.
pub async fn get_entries_by_account(
    account_id: &AccountId,
    pool: &PgPool,
) -> Result<Vec<LedgerEntry>, StoreError> {
    super::account::get_account(account_id, pool).await?;

    let entries = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT * FROM general_ledger
        WHERE account_id = $1
        ORDER BY created_at DESC, seq DESC
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Record ledger rows for completed transfers that are missing either side.
///
/// Each transfer is recorded in its own unit of work. A failure is logged and
/// counted, and does not stop the remaining transfers from being recorded.
pub async fn backfill_transfer_entries(
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<LedgerBackfillResult, StoreError> {
    let missing = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT t.* FROM transactions t
        WHERE t.transaction_type = 'transfer'
          AND t.status = 'completed'
          AND (
            SELECT COUNT(*) FROM general_ledger g
            WHERE g.transaction_id = t.id
          ) < 2
        ORDER BY t.seq
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut result = LedgerBackfillResult {
        transactions_examined: missing.len(),
        entries_written: 0,
        failures: 0,
    };

    for transaction in &missing {
        match backfill_one(transaction, time_source, pool).await {
            Ok(written) => result.entries_written += written,
            Err(e) => {
                result.failures += 1;
                log_error(anyhow::Error::from(e).context(format!(
                    "ledger backfill failed for transaction {}",
                    transaction.id
                )));
            }
        }
    }

    tracing::info!(
        examined = result.transactions_examined,
        written = result.entries_written,
        failures = result.failures,
        "ledger backfill finished"
    );
    Ok(result)
}

async fn backfill_one(
    transaction: &Transaction,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<u64, StoreError> {
    let (Some(from), Some(to)) =
        (transaction.from_account_id, transaction.to_account_id)
    else {
        return Err(StoreError::UnexpectedError(anyhow::anyhow!(
            "transfer {} is missing an account",
            transaction.id
        )));
    };

    let mut tx = pool.begin().await?;
    let written = record_transfer_entries_tx(
        &transaction.id,
        &from,
        &to,
        transaction.amount,
        time_source,
        &mut tx,
    )
    .await?;
    tx.commit().await?;
    Ok(written)
}
