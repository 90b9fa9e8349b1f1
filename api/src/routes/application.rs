use actix_web::{HttpRequest, HttpResponse, get, post, web};
use payloads::{ApplicationId, UserId, requests, responses};
use sqlx::PgPool;

use crate::{store, time::TimeSource};

use super::{APIError, get_principal, referenced_not_found_as_bad_request};

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/application/apply")]
pub async fn apply(
    details: web::Json<requests::CardApplication>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let application =
        store::card::apply_for_card(&details, &time_source, &pool)
            .await
            .map_err(referenced_not_found_as_bad_request)?;
    Ok(HttpResponse::Ok().json(responses::ApplicationReceived {
        message: "Application received".into(),
        application_id: application.id,
    }))
}

#[tracing::instrument(
    skip(request, pool, time_source),
    fields(principal),
    ret
)]
#[post("/application/approve/{application_id}")]
pub async fn approve(
    request: HttpRequest,
    path: web::Path<ApplicationId>,
    query: web::Query<requests::ApproveApplication>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let approver = get_principal(&request)?;
    let card = store::card::approve_application(
        &path,
        query.approved_limit,
        approver.as_ref(),
        &time_source,
        &pool,
    )
    .await
    .map_err(referenced_not_found_as_bad_request)?;
    Ok(HttpResponse::Ok().json(responses::CardIssued {
        message: "Application approved, card issued".into(),
        card_id: card.id,
    }))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/application/reject/{application_id}")]
pub async fn reject(
    path: web::Path<ApplicationId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    store::card::reject_application(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(responses::SuccessMessage {
        message: "Application rejected".into(),
    }))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/application/user/{user_id}")]
pub async fn get_applications_by_user(
    path: web::Path<UserId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let applications =
        store::card::get_applications_by_user(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(applications))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/application/{application_id}")]
pub async fn get_application(
    path: web::Path<ApplicationId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let application = store::card::get_application(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(application))
}
