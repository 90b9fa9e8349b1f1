use actix_web::{HttpResponse, get, post, web};
use payloads::{TransactionId, requests, responses};
use sqlx::PgPool;

use crate::{store, time::TimeSource};

use super::APIError;

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/fraud/rules")]
pub async fn create_rule(
    details: web::Json<requests::CreateFraudRule>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let rule = store::fraud::create_rule(&details, &time_source, &pool).await?;
    Ok(HttpResponse::Created().json(rule))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/fraud/rules")]
pub async fn list_rules(
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let rules = store::fraud::list_rules(&pool).await?;
    Ok(HttpResponse::Ok().json(rules))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/fraud/check-transaction/{transaction_id}")]
pub async fn check_transaction(
    path: web::Path<TransactionId>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let (assessment, alert) =
        store::fraud::check_transaction(&path, &time_source, &pool).await?;
    let message = if alert.is_some() {
        "Suspicious transaction"
    } else {
        "No risk detected"
    };
    Ok(HttpResponse::Ok().json(responses::FraudCheckResult {
        message: message.into(),
        score: assessment.score,
        triggered_rules: assessment.triggered_rules,
        alert_id: alert.map(|a| a.id),
    }))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/fraud/alerts/transaction/{transaction_id}")]
pub async fn get_alerts_by_transaction(
    path: web::Path<TransactionId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let alerts =
        store::fraud::get_alerts_by_transaction(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(alerts))
}
