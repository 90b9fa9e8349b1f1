//! Card payments.
//!
//! A purchase reserves the amount against the card's available limit and,
//! for online and contactless purchases, against the matching sub-limit. Both
//! updates are conditional, so concurrent purchases can't overspend either.

use jiff_sqlx::ToSqlx;
use payloads::{
    CardId, CardLimit, CardStatus, CardTransaction, CreditCard, Currency,
    UserId,
    requests::{self, MERCHANT_NAME_MAX_LEN},
};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{StoreError, check_field, ensure_positive};
use crate::{identifiers, time::TimeSource};

/// Card purchases are settled in lira.
const CARD_CURRENCY: Currency = Currency::Try;

pub async fn get_cards_by_user(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Vec<CreditCard>, StoreError> {
    let cards = sqlx::query_as::<_, CreditCard>(
        "SELECT * FROM credit_cards WHERE user_id = $1 ORDER BY issued_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(cards)
}

pub async fn get_card_limits(
    card_id: &CardId,
    pool: &PgPool,
) -> Result<Vec<CardLimit>, StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM credit_cards WHERE id = $1)",
    )
    .bind(card_id)
    .fetch_one(pool)
    .await?;
    if !exists {
        return Err(StoreError::CardNotFound);
    }

    let limits = sqlx::query_as::<_, CardLimit>(
        "SELECT * FROM card_limits WHERE card_id = $1 ORDER BY limit_type",
    )
    .bind(card_id)
    .fetch_all(pool)
    .await?;
    Ok(limits)
}

/// Authorize a purchase. Returns the card transaction and the card's
/// remaining available limit.
pub async fn card_purchase(
    details: &requests::CardPurchase,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(CardTransaction, Decimal), StoreError> {
    ensure_positive(details.amount)?;
    check_field(&details.merchant_name, MERCHANT_NAME_MAX_LEN)?;

    let mut tx = pool.begin().await?;
    let status: CardStatus = sqlx::query_scalar(
        "SELECT status FROM credit_cards WHERE id = $1 FOR UPDATE",
    )
    .bind(details.card_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StoreError::CardNotFound)?;
    if status != CardStatus::Active {
        return Err(StoreError::CardNotActive);
    }

    let available_limit: Decimal = sqlx::query_scalar(
        r#"
        UPDATE credit_cards
        SET available_limit = available_limit - $2,
            current_balance = current_balance + $2
        WHERE id = $1 AND available_limit >= $2
        RETURNING available_limit
        "#,
    )
    .bind(details.card_id)
    .bind(details.amount)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StoreError::InsufficientCardLimit)?;

    if let Some(limit_type) = details.channel.limit_type() {
        let updated = sqlx::query(
            r#"
            UPDATE card_limits
            SET used_amount = used_amount + $3
            WHERE card_id = $1
              AND limit_type = $2
              AND used_amount + $3 <= limit_amount
            "#,
        )
        .bind(details.card_id)
        .bind(limit_type)
        .bind(details.amount)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::CardSubLimitExceeded { limit_type });
        }
    }

    let authorization_code =
        identifiers::generate_auth_code(&mut rand::thread_rng());
    let card_transaction = sqlx::query_as::<_, CardTransaction>(
        r#"
        INSERT INTO card_transactions (
            card_id,
            merchant_name,
            channel,
            amount,
            currency,
            authorization_code,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(details.card_id)
    .bind(details.merchant_name.trim())
    .bind(details.channel)
    .bind(details.amount)
    .bind(CARD_CURRENCY)
    .bind(&authorization_code)
    .bind(time_source.now().to_sqlx())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        card_id = %details.card_id,
        card_transaction_id = %card_transaction.id,
        amount = %details.amount,
        channel = ?details.channel,
        "card purchase authorized"
    );
    Ok((card_transaction, available_limit))
}
