use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Role, User, UserAccount};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: User,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(AppError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }
    let email_taken = state
        .users
        .iter()
        .any(|entry| entry.value().user.email == payload.email);
    if email_taken {
        return Err(AppError::Validation("email already registered".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        role: payload.role.unwrap_or(Role::Customer),
        expiry: None,
    };
    let account = UserAccount {
        user: user.clone(),
        password_hash: hash_password(&payload.password)?,
    };

    state.users.insert(user.id, account);
    info!(user_id = %user.id, "user registered");

    Ok(Json(user))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let account = state
        .users
        .iter()
        .find(|entry| entry.value().user.email == payload.email)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::AuthRequired("invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &account.password_hash) {
        return Err(AppError::AuthRequired("invalid credentials".to_string()));
    }

    let mut user = account.user;
    user.expiry = Some(Utc::now() + Duration::seconds(state.session_ttl_secs));

    let access_token = Uuid::new_v4().to_string();
    state.tokens.insert(access_token.clone(), user.id);

    state.session.set_user(user.clone()).await?;
    state.session.store_token(&access_token)?;

    info!(user_id = %user.id, "user signed in");

    Ok(Json(LoginResponse { access_token, user }))
}

async fn logout(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.session.clear_user().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session(State(state): State<Arc<AppState>>) -> Result<Json<User>, AppError> {
    state
        .session
        .current()
        .await
        .map(Json)
        .ok_or_else(|| AppError::AuthRequired("no active session".to_string()))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Internal(format!("failed to hash password: {err}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
