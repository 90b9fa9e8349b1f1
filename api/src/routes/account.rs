use actix_web::{HttpResponse, get, post, put, web};
use payloads::{AccountId, UserId, requests, responses};
use sqlx::PgPool;

use crate::{store, time::TimeSource};

use super::{APIError, referenced_not_found_as_bad_request};

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/accounts")]
pub async fn create_account(
    details: web::Json<requests::CreateAccount>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let account =
        store::account::create_account(&details, &time_source, &pool)
            .await
            .map_err(referenced_not_found_as_bad_request)?;
    Ok(HttpResponse::Created().json(account))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/accounts")]
pub async fn list_accounts(
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let accounts = store::account::list_accounts(&pool).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/accounts/user/{user_id}")]
pub async fn get_accounts_by_user(
    path: web::Path<UserId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let accounts = store::account::get_accounts_by_user(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/accounts/{account_id}")]
pub async fn get_account(
    path: web::Path<AccountId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let account = store::account::get_account(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(account))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/accounts/{account_id}/deposit")]
pub async fn deposit(
    path: web::Path<AccountId>,
    details: web::Json<requests::CashMovement>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let (account, transaction) =
        store::account::deposit(&path, &details, &time_source, &pool).await?;
    Ok(HttpResponse::Ok().json(responses::BalanceMovement {
        message: "Deposit completed".into(),
        transaction_id: Some(transaction.id),
        account,
    }))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/accounts/{account_id}/withdraw")]
pub async fn withdraw(
    path: web::Path<AccountId>,
    details: web::Json<requests::CashMovement>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let (account, transaction) =
        store::account::withdraw(&path, &details, &time_source, &pool).await?;
    Ok(HttpResponse::Ok().json(responses::BalanceMovement {
        message: "Withdrawal completed".into(),
        transaction_id: Some(transaction.id),
        account,
    }))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[put("/accounts/{account_id}/status")]
pub async fn update_status(
    path: web::Path<AccountId>,
    details: web::Json<requests::UpdateAccountStatus>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let account = store::account::update_status(
        &path,
        details.status,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(account))
}

/// Administrative balance correction, booked as an Adjustment transaction.
#[tracing::instrument(skip(pool, time_source), ret)]
#[put("/accounts/{account_id}/balance")]
pub async fn update_balance(
    path: web::Path<AccountId>,
    details: web::Json<requests::UpdateBalance>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let (account, transaction) =
        store::account::set_balance(&path, &details, &time_source, &pool)
            .await?;
    let message = match transaction {
        Some(_) => "Balance adjusted",
        None => "Balance already matches",
    };
    Ok(HttpResponse::Ok().json(responses::BalanceMovement {
        message: message.into(),
        transaction_id: transaction.map(|t| t.id),
        account,
    }))
}
