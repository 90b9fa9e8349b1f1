use actix_web::{HttpResponse, get, post, web};
use payloads::{CardId, UserId, requests, responses};
use sqlx::PgPool;

use crate::{store, time::TimeSource};

use super::APIError;

#[tracing::instrument(skip(pool), ret)]
#[get("/payments/cards/user/{user_id}")]
pub async fn get_cards_by_user(
    path: web::Path<UserId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let cards = store::payment::get_cards_by_user(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(cards))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/payments/cards/{card_id}/limits")]
pub async fn get_card_limits(
    path: web::Path<CardId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let limits = store::payment::get_card_limits(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(limits))
}

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/payments/transaction")]
pub async fn card_purchase(
    details: web::Json<requests::CardPurchase>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let (card_transaction, available_limit) =
        store::payment::card_purchase(&details, &time_source, &pool).await?;
    Ok(HttpResponse::Ok().json(responses::CardPurchaseReceipt {
        message: "Payment approved".into(),
        card_transaction_id: card_transaction.id,
        authorization_code: card_transaction.authorization_code,
        available_limit,
    }))
}
