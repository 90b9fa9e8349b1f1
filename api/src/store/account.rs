//! Account store
//!
//! Accounts hold a balance and an available balance. There is no hold
//! mechanism, so both move together, but checks are always made against the
//! available balance.
//!
//! All balance changes go through [`adjust_balance_tx`], inside the caller's
//! transaction. Administrative balance corrections are booked as Adjustment
//! transactions for the difference, so the ledger explains every balance.

use jiff_sqlx::ToSqlx;
use payloads::{
    Account, AccountId, AccountStatus, LedgerEntryType, Transaction,
    TransactionType, UserId,
    requests::{self, DESCRIPTION_MAX_LEN},
};
use rust_decimal::{Decimal, dec};
use sqlx::PgPool;

use super::{
    StoreError, check_optional_field, ensure_non_negative, ensure_positive,
    ledger::record_single_entry_tx,
    transfer::{NewTransaction, insert_transaction_tx, outgoing_total_since_tx},
    user::ensure_user_exists_tx,
};
use crate::{identifiers, time::TimeSource};

pub const DEFAULT_DAILY_TRANSFER_LIMIT: Decimal = dec!(50000);
pub const DEFAULT_DAILY_WITHDRAWAL_LIMIT: Decimal = dec!(10000);

const OPENING_DEPOSIT_DESCRIPTION: &str = "Opening deposit";
const DEPOSIT_DESCRIPTION: &str = "Cash deposit";
const WITHDRAWAL_DESCRIPTION: &str = "Cash withdrawal";
const ADJUSTMENT_DESCRIPTION: &str = "Administrative balance adjustment";

pub async fn create_account(
    details: &requests::CreateAccount,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<Account, StoreError> {
    let daily_transfer_limit = details
        .daily_transfer_limit
        .unwrap_or(DEFAULT_DAILY_TRANSFER_LIMIT);
    let daily_withdrawal_limit = details
        .daily_withdrawal_limit
        .unwrap_or(DEFAULT_DAILY_WITHDRAWAL_LIMIT);
    ensure_non_negative(daily_transfer_limit)?;
    ensure_non_negative(daily_withdrawal_limit)?;
    if let Some(opening_deposit) = details.opening_deposit {
        ensure_non_negative(opening_deposit)?;
    }
    let account_number = match &details.account_number {
        Some(number) => identifiers::normalize_iban(number)
            .ok_or(StoreError::InvalidAccountNumber)?,
        None => identifiers::generate_iban(&mut rand::thread_rng()),
    };

    let now = time_source.now();
    let mut tx = pool.begin().await?;
    ensure_user_exists_tx(&details.user_id, &mut tx).await?;

    let mut account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (
            user_id,
            account_number,
            account_type,
            currency,
            daily_transfer_limit,
            daily_withdrawal_limit,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING *
        "#,
    )
    .bind(details.user_id)
    .bind(&account_number)
    .bind(details.account_type)
    .bind(details.currency)
    .bind(daily_transfer_limit)
    .bind(daily_withdrawal_limit)
    .bind(now.to_sqlx())
    .fetch_one(&mut *tx)
    .await?;

    if let Some(opening_deposit) =
        details.opening_deposit.filter(|d| *d > Decimal::ZERO)
    {
        let (updated, _) = book_tx(
            &account,
            LedgerEntryType::Credit,
            TransactionType::Deposit,
            opening_deposit,
            OPENING_DEPOSIT_DESCRIPTION,
            time_source,
            &mut tx,
        )
        .await?;
        account = updated;
    }

    tx.commit().await?;
    tracing::info!(
        account_id = %account.id,
        account_number = %account.account_number,
        "account opened"
    );
    Ok(account)
}

pub async fn get_account(
    account_id: &AccountId,
    pool: &PgPool,
) -> Result<Account, StoreError> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::AccountNotFound)
}

pub async fn list_accounts(pool: &PgPool) -> Result<Vec<Account>, StoreError> {
    let accounts = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts ORDER BY created_at, account_number",
    )
    .fetch_all(pool)
    .await?;
    Ok(accounts)
}

pub async fn get_accounts_by_user(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Vec<Account>, StoreError> {
    let accounts = sqlx::query_as::<_, Account>(
        r#"
        SELECT * FROM accounts
        WHERE user_id = $1
        ORDER BY created_at, account_number
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(accounts)
}

/// Lock an account row until the surrounding transaction ends.
///
/// Returns None if the account doesn't exist. Callers locking several
/// accounts must lock them in ascending id order.
pub(crate) async fn lock_account_tx(
    account_id: &AccountId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Option<Account>, StoreError> {
    let account = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE id = $1 FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(account)
}

/// Add `delta` (negative to debit) to both balances of an account.
///
/// The update is conditional on the available balance staying non-negative,
/// so it is safe even if the caller's earlier balance check raced with
/// another writer. Fails with `InsufficientFunds` when the condition doesn't
/// hold and `AccountNotFound` when there is no such account.
pub async fn adjust_balance_tx(
    account_id: &AccountId,
    delta: Decimal,
    time_source: &TimeSource,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Account, StoreError> {
    let updated = sqlx::query_as::<_, Account>(
        r#"
        UPDATE accounts
        SET balance = balance + $2,
            available_balance = available_balance + $2,
            updated_at = $3
        WHERE id = $1 AND available_balance + $2 >= 0
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(delta)
    .bind(time_source.now().to_sqlx())
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(account) = updated {
        return Ok(account);
    }

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)",
    )
    .bind(account_id)
    .fetch_one(&mut **tx)
    .await?;
    Err(if exists {
        StoreError::InsufficientFunds
    } else {
        StoreError::AccountNotFound
    })
}

/// Book a movement between an account and the outside world: adjust the
/// balance, record the transaction and write its single ledger row.
///
/// A Credit moves `amount` into the account, a Debit moves it out. The
/// account must already be locked.
async fn book_tx(
    account: &Account,
    entry_type: LedgerEntryType,
    transaction_type: TransactionType,
    amount: Decimal,
    description: &str,
    time_source: &TimeSource,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<(Account, Transaction), StoreError> {
    let (delta, from_account_id, to_account_id) = match entry_type {
        LedgerEntryType::Debit => (-amount, Some(account.id), None),
        LedgerEntryType::Credit => (amount, None, Some(account.id)),
    };

    let updated =
        adjust_balance_tx(&account.id, delta, time_source, tx).await?;
    let transaction = insert_transaction_tx(
        NewTransaction {
            reference_number: None,
            from_account_id,
            to_account_id,
            amount,
            currency: account.currency,
            transaction_type,
            description: Some(description),
        },
        time_source,
        tx,
    )
    .await?;
    record_single_entry_tx(
        &transaction.id,
        &account.id,
        entry_type,
        amount,
        description,
        time_source,
        tx,
    )
    .await?;

    Ok((updated, transaction))
}

fn require_active(account: &Account) -> Result<(), StoreError> {
    if account.status != AccountStatus::Active {
        return Err(StoreError::AccountNotActive);
    }
    Ok(())
}

pub async fn deposit(
    account_id: &AccountId,
    details: &requests::CashMovement,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(Account, Transaction), StoreError> {
    ensure_positive(details.amount)?;
    check_optional_field(details.description.as_deref(), DESCRIPTION_MAX_LEN)?;

    let mut tx = pool.begin().await?;
    let account = lock_account_tx(account_id, &mut tx)
        .await?
        .ok_or(StoreError::AccountNotFound)?;
    require_active(&account)?;

    let booked = book_tx(
        &account,
        LedgerEntryType::Credit,
        TransactionType::Deposit,
        details.amount,
        details.description.as_deref().unwrap_or(DEPOSIT_DESCRIPTION),
        time_source,
        &mut tx,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(account_id = %account.id, amount = %details.amount, "deposit");
    Ok(booked)
}

pub async fn withdraw(
    account_id: &AccountId,
    details: &requests::CashMovement,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(Account, Transaction), StoreError> {
    ensure_positive(details.amount)?;
    check_optional_field(details.description.as_deref(), DESCRIPTION_MAX_LEN)?;

    let mut tx = pool.begin().await?;
    let account = lock_account_tx(account_id, &mut tx)
        .await?
        .ok_or(StoreError::AccountNotFound)?;
    require_active(&account)?;
    if account.available_balance < details.amount {
        return Err(StoreError::InsufficientFunds);
    }

    let withdrawn_today = outgoing_total_since_tx(
        &account.id,
        TransactionType::Withdrawal,
        time_source.start_of_utc_day()?,
        &mut tx,
    )
    .await?;
    if withdrawn_today + details.amount > account.daily_withdrawal_limit {
        return Err(StoreError::DailyWithdrawalLimitExceeded {
            remaining: (account.daily_withdrawal_limit - withdrawn_today)
                .max(Decimal::ZERO),
        });
    }

    let booked = book_tx(
        &account,
        LedgerEntryType::Debit,
        TransactionType::Withdrawal,
        details.amount,
        details
            .description
            .as_deref()
            .unwrap_or(WITHDRAWAL_DESCRIPTION),
        time_source,
        &mut tx,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(account_id = %account.id, amount = %details.amount, "withdrawal");
    Ok(booked)
}

pub async fn update_status(
    account_id: &AccountId,
    status: AccountStatus,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<Account, StoreError> {
    let mut tx = pool.begin().await?;
    let account = lock_account_tx(account_id, &mut tx)
        .await?
        .ok_or(StoreError::AccountNotFound)?;
    if account.status == AccountStatus::Closed && status != AccountStatus::Closed
    {
        return Err(StoreError::AccountClosed);
    }

    let account = sqlx::query_as::<_, Account>(
        r#"
        UPDATE accounts SET status = $2, updated_at = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(status)
    .bind(time_source.now().to_sqlx())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(account_id = %account.id, status = ?status, "account status changed");
    Ok(account)
}

/// Bring an account's balance to `new_balance` by booking an Adjustment
/// transaction for the difference.
///
/// Returns the account and, unless the balance already matched, the
/// adjustment transaction.
pub async fn set_balance(
    account_id: &AccountId,
    details: &requests::UpdateBalance,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(Account, Option<Transaction>), StoreError> {
    ensure_non_negative(details.new_balance)?;
    check_optional_field(details.reason.as_deref(), DESCRIPTION_MAX_LEN)?;

    let mut tx = pool.begin().await?;
    let account = lock_account_tx(account_id, &mut tx)
        .await?
        .ok_or(StoreError::AccountNotFound)?;

    let delta = details.new_balance - account.balance;
    if delta == Decimal::ZERO {
        return Ok((account, None));
    }
    let entry_type = if delta < Decimal::ZERO {
        LedgerEntryType::Debit
    } else {
        LedgerEntryType::Credit
    };

    let (account, transaction) = book_tx(
        &account,
        entry_type,
        TransactionType::Adjustment,
        delta.abs(),
        details.reason.as_deref().unwrap_or(ADJUSTMENT_DESCRIPTION),
        time_source,
        &mut tx,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        account_id = %account.id,
        delta = %delta,
        transaction_id = %transaction.id,
        "balance adjusted"
    );
    Ok((account, Some(transaction)))
}
