pub mod account;
pub mod application;
pub mod fraud;
pub mod ledger;
pub mod payment;
pub mod transaction;
pub mod user;

use actix_web::{
    HttpRequest, HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, web,
};
use payloads::api_client::PRINCIPAL_HEADER;
use uuid::Uuid;

use crate::store::StoreError;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(user::create_user)
        .service(user::list_users)
        .service(user::get_user)
        .service(account::create_account)
        .service(account::list_accounts)
        .service(account::get_accounts_by_user)
        .service(account::get_account)
        .service(account::deposit)
        .service(account::withdraw)
        .service(account::update_status)
        .service(account::update_balance)
        .service(transaction::transfer)
        .service(transaction::get_transactions_by_account)
        .service(transaction::get_transaction)
        .service(ledger::get_entries_by_transaction)
        .service(ledger::get_entries_by_account)
        .service(ledger::backfill)
        .service(application::apply)
        .service(application::approve)
        .service(application::reject)
        .service(application::get_applications_by_user)
        .service(application::get_application)
        .service(payment::get_cards_by_user)
        .service(payment::get_card_limits)
        .service(payment::card_purchase)
        .service(fraud::create_rule)
        .service(fraud::list_rules)
        .service(fraud::check_transaction)
        .service(fraud::get_alerts_by_transaction)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            // body carries the full fault chain
            Self::UnexpectedError(e) => {
                HttpResponse::InternalServerError().body(format!("{self}: {e:#}"))
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(_) => APIError::UnexpectedError(e.into()),
            StoreError::UnexpectedError(_) => {
                APIError::UnexpectedError(e.into())
            }
            StoreError::AccountNotFound => APIError::NotFound(e.into()),
            StoreError::UserNotFound => APIError::NotFound(e.into()),
            StoreError::TransactionNotFound => APIError::NotFound(e.into()),
            StoreError::ApplicationNotFound => APIError::NotFound(e.into()),
            StoreError::CardNotFound => APIError::NotFound(e.into()),
            _ => APIError::BadRequest(e.into()),
        }
    }
}

/// For operations where a missing account or user is part of an invalid
/// request body rather than a missing resource in the path.
fn referenced_not_found_as_bad_request(e: StoreError) -> APIError {
    match e {
        StoreError::AccountNotFound | StoreError::UserNotFound => {
            APIError::BadRequest(e.into())
        }
        e => e.into(),
    }
}

/// The acting user, taken from the `X-User-Id` header if present.
fn get_principal(
    request: &HttpRequest,
) -> Result<Option<payloads::UserId>, APIError> {
    let Some(value) = request.headers().get(PRINCIPAL_HEADER) else {
        return Ok(None);
    };
    let id = value
        .to_str()
        .map_err(anyhow::Error::from)
        .and_then(|s| Uuid::parse_str(s).map_err(anyhow::Error::from))
        .map_err(|e| {
            APIError::BadRequest(e.context("Invalid X-User-Id header"))
        })?;
    // recorded here, but attaches to the span for the api route itself
    tracing::Span::current()
        .record("principal", tracing::field::display(&id));
    Ok(Some(payloads::UserId(id)))
}
