//! Fraud scoring.
//!
//! Scoring runs after a transaction has committed and never touches
//! balances. Each active rule that triggers adds its weight to the score,
//! which is capped at 100 and written back to the transaction. A non-zero
//! score raises an alert.

use jiff::Span;
use jiff_sqlx::ToSqlx;
use payloads::{
    AlertSeverity, FraudAlert, FraudRule, FraudRuleType, Transaction,
    TransactionId, UserId,
    requests::{self, DESCRIPTION_MAX_LEN, NAME_MAX_LEN},
};
use rust_decimal::{Decimal, dec};
use sqlx::PgPool;

use super::{
    StoreError, check_field, check_optional_field, ensure_non_negative,
};
use crate::time::TimeSource;

pub const MAX_SCORE: i16 = 100;
/// Scores above this raise a Critical alert instead of a High one.
pub const CRITICAL_SCORE: i16 = 80;
pub const DEFAULT_AMOUNT_THRESHOLD: Decimal = dec!(50000);
/// Outgoing transactions per hour.
pub const DEFAULT_VELOCITY_THRESHOLD: Decimal = dec!(5);

fn velocity_window() -> Span {
    Span::new().hours(1)
}

/// What the rules look at for one transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionFacts {
    pub amount: Decimal,
    /// Transactions initiated by the source account in the hour up to and
    /// including this one. Zero when there is no source account.
    pub recent_outgoing: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub score: i16,
    pub triggered_rules: Vec<String>,
}

fn triggers(rule: &FraudRule, facts: &TransactionFacts) -> bool {
    match rule.rule_type {
        FraudRuleType::AmountAnomaly => facts.amount > rule.threshold,
        FraudRuleType::Velocity => {
            Decimal::from(facts.recent_outgoing) > rule.threshold
        }
    }
}

/// Sum the weights of the active rules that trigger.
pub fn evaluate(rules: &[FraudRule], facts: &TransactionFacts) -> Assessment {
    let mut total: i64 = 0;
    let mut triggered_rules = Vec::new();
    for rule in rules.iter().filter(|r| r.is_active) {
        if triggers(rule, facts) {
            total += i64::from(rule.risk_score_weight.max(0));
            triggered_rules.push(rule.rule_name.clone());
        }
    }
    Assessment {
        score: total.min(i64::from(MAX_SCORE)) as i16,
        triggered_rules,
    }
}

pub fn severity_for(score: i16) -> AlertSeverity {
    if score > CRITICAL_SCORE {
        AlertSeverity::Critical
    } else {
        AlertSeverity::High
    }
}

pub async fn create_rule(
    details: &requests::CreateFraudRule,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<FraudRule, StoreError> {
    check_field(&details.rule_name, NAME_MAX_LEN)?;
    check_optional_field(details.description.as_deref(), DESCRIPTION_MAX_LEN)?;
    if !(0..=i32::from(MAX_SCORE)).contains(&details.risk_score_weight) {
        return Err(StoreError::InvalidRiskWeight);
    }
    let threshold = details.threshold.unwrap_or(match details.rule_type {
        FraudRuleType::AmountAnomaly => DEFAULT_AMOUNT_THRESHOLD,
        FraudRuleType::Velocity => DEFAULT_VELOCITY_THRESHOLD,
    });
    ensure_non_negative(threshold)?;

    let rule = sqlx::query_as::<_, FraudRule>(
        r#"
        INSERT INTO fraud_rules (
            rule_name,
            rule_type,
            description,
            threshold,
            risk_score_weight,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(details.rule_name.trim())
    .bind(details.rule_type)
    .bind(details.description.as_deref())
    .bind(threshold)
    .bind(details.risk_score_weight)
    .bind(time_source.now().to_sqlx())
    .fetch_one(pool)
    .await?;
    Ok(rule)
}

pub async fn list_rules(pool: &PgPool) -> Result<Vec<FraudRule>, StoreError> {
    let rules = sqlx::query_as::<_, FraudRule>(
        "SELECT * FROM fraud_rules ORDER BY created_at, rule_name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rules)
}

/// Score a committed transaction, store the score and raise an alert if it
/// is non-zero.
pub async fn check_transaction(
    transaction_id: &TransactionId,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(Assessment, Option<FraudAlert>), StoreError> {
    let mut tx = pool.begin().await?;
    let transaction = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
    )
    .bind(transaction_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StoreError::TransactionNotFound)?;

    let rules = sqlx::query_as::<_, FraudRule>(
        "SELECT * FROM fraud_rules WHERE is_active",
    )
    .fetch_all(&mut *tx)
    .await?;

    let recent_outgoing = match transaction.from_account_id {
        Some(from) => {
            let window_start =
                transaction.created_at.checked_sub(velocity_window())?;
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM transactions
                WHERE from_account_id = $1
                  AND created_at > $2
                  AND created_at <= $3
                "#,
            )
            .bind(from)
            .bind(window_start.to_sqlx())
            .bind(transaction.created_at.to_sqlx())
            .fetch_one(&mut *tx)
            .await?
        }
        None => 0,
    };

    let assessment = evaluate(
        &rules,
        &TransactionFacts {
            amount: transaction.amount,
            recent_outgoing,
        },
    );

    sqlx::query(
        r#"
        UPDATE transactions SET fraud_score = $2, is_suspicious = $3
        WHERE id = $1
        "#,
    )
    .bind(transaction.id)
    .bind(assessment.score)
    .bind(assessment.score > 0)
    .execute(&mut *tx)
    .await?;

    let alert = if assessment.score > 0 {
        let user_id: Option<UserId> = match transaction
            .from_account_id
            .or(transaction.to_account_id)
        {
            Some(account_id) => {
                sqlx::query_scalar("SELECT user_id FROM accounts WHERE id = $1")
                    .bind(account_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };
        let alert = sqlx::query_as::<_, FraudAlert>(
            r#"
            INSERT INTO fraud_alerts (
                user_id,
                transaction_id,
                fraud_score,
                triggered_rules,
                alert_severity,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(transaction.id)
        .bind(assessment.score)
        .bind(assessment.triggered_rules.join(", "))
        .bind(severity_for(assessment.score))
        .bind(time_source.now().to_sqlx())
        .fetch_one(&mut *tx)
        .await?;
        tracing::warn!(
            transaction_id = %transaction.id,
            score = assessment.score,
            rules = %alert.triggered_rules,
            "fraud alert raised"
        );
        Some(alert)
    } else {
        None
    };

    tx.commit().await?;
    Ok((assessment, alert))
}

pub async fn get_alerts_by_transaction(
    transaction_id: &TransactionId,
    pool: &PgPool,
) -> Result<Vec<FraudAlert>, StoreError> {
    super::transfer::get_transaction(transaction_id, pool).await?;

    let alerts = sqlx::query_as::<_, FraudAlert>(
        r#"
        SELECT * FROM fraud_alerts
        WHERE transaction_id = $1
        ORDER BY created_at DESC, id
        "#,
    )
    .bind(transaction_id)
    .fetch_all(pool)
    .await?;
    Ok(alerts)
}
