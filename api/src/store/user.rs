//! Account holders. Authentication lives outside this service; a user is
//! just the owner of accounts, applications and cards.

use jiff_sqlx::ToSqlx;
use payloads::{
    User, UserId,
    requests::{self, EMAIL_MAX_LEN, NAME_MAX_LEN},
};
use sqlx::PgPool;

use super::{StoreError, check_field};
use crate::time::TimeSource;

fn validate_email(email: &str) -> Result<(), StoreError> {
    check_field(email, EMAIL_MAX_LEN)?;
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err(StoreError::InvalidEmail),
    }
}

pub async fn create_user(
    details: &requests::CreateUser,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<User, StoreError> {
    check_field(&details.first_name, NAME_MAX_LEN)?;
    check_field(&details.last_name, NAME_MAX_LEN)?;
    let email = details.email.trim().to_lowercase();
    validate_email(&email)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (first_name, last_name, email, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(details.first_name.trim())
    .bind(details.last_name.trim())
    .bind(&email)
    .bind(time_source.now().to_sqlx())
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn get_user(user_id: &UserId, pool: &PgPool) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::UserNotFound)
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, StoreError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY last_name, first_name, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub(crate) async fn ensure_user_exists_tx(
    user_id: &UserId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<(), StoreError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;
    if !exists {
        return Err(StoreError::UserNotFound);
    }
    Ok(())
}
