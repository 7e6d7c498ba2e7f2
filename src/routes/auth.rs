use crate::{
    auth::{
        generate_token, hash_password, verify_password, AuthResponse, AuthUser, LoginRequest,
        RegisterRequest,
    },
    config::Config,
    error::AppError,
    models::User,
    security::sanitize_text,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Register a new user.
///
/// Creates the account with the default `user` role and returns the profile
/// together with a 7-day session token.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let existing: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&register_data.email)
        .fetch_optional(&**pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Email already used".into()));
    }

    let password_hash = hash_password(&register_data.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
         RETURNING id, name, email, role, created_at",
    )
    .bind(sanitize_text(&register_data.name))
    .bind(sanitize_text(&register_data.email))
    .bind(password_hash)
    .fetch_one(&**pool)
    .await?;

    let token = generate_token(user.id, &config.jwt_secret)?;

    Ok(HttpResponse::Created().json(json!({
        "ok": true,
        "data": AuthResponse { user, token }
    })))
}

/// Login with email and password.
///
/// Unknown email and wrong password both return the same undifferentiated
/// 401 so the response does not reveal which credential was wrong.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let row: Option<(i32, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(&login_data.email)
            .fetch_optional(&**pool)
            .await?;

    let (user_id, password_hash) = match row {
        Some(row) => row,
        None => return Err(AppError::Auth("Invalid credentials".into())),
    };

    if !verify_password(&login_data.password, &password_hash)? {
        return Err(AppError::Auth("Invalid credentials".into()));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&**pool)
    .await?;

    let token = generate_token(user.id, &config.jwt_secret)?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "data": AuthResponse { user, token }
    })))
}

/// Returns the caller's profile, without the password hash.
#[get("/me")]
pub async fn me(pool: web::Data<PgPool>, auth: AuthUser) -> Result<impl Responder, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
    )
    .bind(auth.id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": user })))
}
