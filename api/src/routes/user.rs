use actix_web::{HttpResponse, get, post, web};
use payloads::{UserId, requests};
use sqlx::PgPool;

use crate::{store, time::TimeSource};

use super::APIError;

#[tracing::instrument(skip(pool, time_source), ret)]
#[post("/users")]
pub async fn create_user(
    details: web::Json<requests::CreateUser>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user = store::user::create_user(&details, &time_source, &pool).await?;
    Ok(HttpResponse::Created().json(user))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/users")]
pub async fn list_users(
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let users = store::user::list_users(&pool).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[tracing::instrument(skip(pool), ret)]
#[get("/users/{user_id}")]
pub async fn get_user(
    path: web::Path<UserId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user = store::user::get_user(&path, &pool).await?;
    Ok(HttpResponse::Ok().json(user))
}
