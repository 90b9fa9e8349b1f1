use actix_web::{HttpResponse, get, post, web};
use payloads::{AccountId, TransactionId, requests, responses};
use sqlx::PgPool;

use crate::{store, time::TimeSource};

use super::{APIError, referenced_not_found_as_bad_request};

/// Missing accounts are reported as 400 so clients can tell a bad request
/// from a fault, as with insufficient funds.
#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/transactions/transfer")]
pub async fn transfer(
    details: web::Json<requests::Transfer>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let transaction = store::transfer::transfer(&details, &time_source, &pool)
        .await
        .map_err(referenced_not_found_as_bad_request)?;
    Ok(HttpResponse::Ok().json(responses::TransferReceipt {
        message: "Transfer completed".into(),
        transaction_id: transaction.id,
        reference: transaction.reference_number,
    }))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/transactions/account/{account_id}")]
pub async fn get_transactions_by_account(
    path: web::Path<AccountId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let transactions =
        store::transfer::get_transactions_by_account(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/transactions/{transaction_id}")]
pub async fn get_transaction(
    path: web::Path<TransactionId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let transaction = store::transfer::get_transaction(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(transaction))
}
