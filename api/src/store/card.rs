//! Card applications and card issuance
//!
//! Approving an application is one unit of work: the application row is
//! locked and marked Approved, the card is created with its full limit
//! available, and the OnlineShopping and Contactless sub-limits are seeded.
//! Either all of it commits or none of it does, so there is never a card
//! without sub-limits or an approved application without a card.

use jiff::{Span, tz::TimeZone};
use jiff_sqlx::ToSqlx;
use payloads::{
    ApplicationId, ApplicationStatus, CardApplication, CardLimitType,
    CreditCard, UserId,
    requests::{self, NAME_MAX_LEN},
};
use rust_decimal::{Decimal, dec};
use sqlx::PgPool;

use super::{
    StoreError, check_optional_field, ensure_non_negative, ensure_positive,
    user::ensure_user_exists_tx,
};
use crate::{identifiers, time::TimeSource};

/// Contactless payments are capped at this, or at the card's limit if lower.
pub const CONTACTLESS_LIMIT: Decimal = dec!(750);
const CARD_VALIDITY_YEARS: i64 = 4;
const PAYMENT_DUE_DAYS: i64 = 30;

/// Sub-limits seeded for a new card with the given credit limit.
pub fn initial_sub_limits(credit_limit: Decimal) -> [(CardLimitType, Decimal); 2] {
    [
        (CardLimitType::OnlineShopping, credit_limit),
        (CardLimitType::Contactless, CONTACTLESS_LIMIT.min(credit_limit)),
    ]
}

pub async fn apply_for_card(
    details: &requests::CardApplication,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<CardApplication, StoreError> {
    ensure_non_negative(details.monthly_income)?;
    check_optional_field(details.employer_name.as_deref(), NAME_MAX_LEN * 2)?;

    let mut tx = pool.begin().await?;
    ensure_user_exists_tx(&details.user_id, &mut tx).await?;

    let application = sqlx::query_as::<_, CardApplication>(
        r#"
        INSERT INTO card_applications (
            user_id,
            card_type_requested,
            monthly_income,
            employment_status,
            employer_name,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(details.user_id)
    .bind(details.card_type_requested)
    .bind(details.monthly_income)
    .bind(details.employment_status)
    .bind(details.employer_name.as_deref())
    .bind(time_source.now().to_sqlx())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(application_id = %application.id, "card application received");
    Ok(application)
}

pub async fn get_application(
    application_id: &ApplicationId,
    pool: &PgPool,
) -> Result<CardApplication, StoreError> {
    sqlx::query_as::<_, CardApplication>(
        "SELECT * FROM card_applications WHERE id = $1",
    )
    .bind(application_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::ApplicationNotFound)
}

pub async fn get_applications_by_user(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Vec<CardApplication>, StoreError> {
    let applications = sqlx::query_as::<_, CardApplication>(
        r#"
        SELECT * FROM card_applications
        WHERE user_id = $1
        ORDER BY created_at DESC, id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(applications)
}

/// Approve a pending application and issue its card.
pub async fn approve_application(
    application_id: &ApplicationId,
    approved_limit: Decimal,
    approver: Option<&UserId>,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<CreditCard, StoreError> {
    approve_application_inner(
        application_id,
        approved_limit,
        approver,
        time_source,
        pool,
    )
    .await
    .inspect_err(|e| {
        if !e.is_fault() {
            tracing::warn!(
                application_id = %application_id,
                approved_limit = %approved_limit,
                "card approval rejected: {e}"
            );
        }
    })
}

async fn approve_application_inner(
    application_id: &ApplicationId,
    approved_limit: Decimal,
    approver: Option<&UserId>,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<CreditCard, StoreError> {
    ensure_positive(approved_limit)?;

    let mut tx = pool.begin().await?;
    let application = sqlx::query_as::<_, CardApplication>(
        "SELECT * FROM card_applications WHERE id = $1 FOR UPDATE",
    )
    .bind(application_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StoreError::ApplicationNotFound)?;
    if application.status != ApplicationStatus::Pending {
        return Err(StoreError::ApplicationNotPending);
    }
    if let Some(approver) = approver {
        ensure_user_exists_tx(approver, &mut tx).await?;
    }

    let now = time_source.now();
    let expiry = now
        .to_zoned(TimeZone::UTC)
        .checked_add(Span::new().years(CARD_VALIDITY_YEARS))?;
    let payment_due_at =
        now.checked_add(Span::new().hours(PAYMENT_DUE_DAYS * 24))?;

    sqlx::query(
        r#"
        UPDATE card_applications
        SET status = $2,
            approved_by = $3,
            approved_at = $4,
            credit_limit_approved = $5
        WHERE id = $1
        "#,
    )
    .bind(application_id)
    .bind(ApplicationStatus::Approved)
    .bind(approver)
    .bind(now.to_sqlx())
    .bind(approved_limit)
    .execute(&mut *tx)
    .await?;

    let pan = identifiers::generate_pan(&mut rand::thread_rng());
    let card = sqlx::query_as::<_, CreditCard>(
        r#"
        INSERT INTO credit_cards (
            user_id,
            application_id,
            card_last_four,
            card_number_digest,
            card_brand,
            card_type,
            credit_limit,
            available_limit,
            current_balance,
            expiry_month,
            expiry_year,
            payment_due_at,
            issued_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7, 0, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(application.user_id)
    .bind(application.id)
    .bind(&pan.last_four)
    .bind(&pan.digest)
    .bind(pan.brand)
    .bind(application.card_type_requested)
    .bind(approved_limit)
    .bind(i16::from(expiry.month()))
    .bind(expiry.year())
    .bind(payment_due_at.to_sqlx())
    .bind(now.to_sqlx())
    .fetch_one(&mut *tx)
    .await?;

    for (limit_type, limit_amount) in initial_sub_limits(approved_limit) {
        sqlx::query(
            r#"
            INSERT INTO card_limits (card_id, limit_type, limit_amount)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(card.id)
        .bind(limit_type)
        .bind(limit_amount)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        application_id = %application.id,
        card_id = %card.id,
        credit_limit = %approved_limit,
        "card issued"
    );
    Ok(card)
}

pub async fn reject_application(
    application_id: &ApplicationId,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE card_applications SET status = 'rejected'
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(application_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // tell apart a missing application from one already decided
        get_application(application_id, pool).await?;
        return Err(StoreError::ApplicationNotPending);
    }
    tracing::info!(application_id = %application_id, "card application rejected");
    Ok(())
}
