use actix_web::{HttpResponse, get, post, web};
use payloads::{AccountId, TransactionId};
use sqlx::PgPool;

use crate::{store, time::TimeSource};

use super::APIError;

#[tracing::instrument(skip(pool), ret)]
#[get("/ledger/transaction/{transaction_id}")]
pub async fn get_entries_by_transaction(
    path: web::Path<TransactionId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let entries =
        store::ledger::get_entries_by_transaction(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/ledger/account/{account_id}")]
pub async fn get_entries_by_account(
    path: web::Path<AccountId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let entries = store::ledger::get_entries_by_account(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/ledger/backfill")]
pub async fn backfill(
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let result =
        store::ledger::backfill_transfer_entries(&time_source, &pool).await?;
    Ok(HttpResponse::Ok().json(result))
}
