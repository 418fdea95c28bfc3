//! Sign-up, login and logout. Mounted at the root prefix.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{extract::State, Extension, Json};
use chrono::Utc;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{HandlerSet, RouteError};
use crate::error::ApiError;
use crate::response::{ApiResponse, ApiResult};
use crate::session::SessionHandle;
use crate::state::AppState;

pub const MODULE: &str = "./src/routes/auth";

/// Roles a user record may carry; one per portal section.
pub const ROLES: &[&str] = &["admin", "teacher", "student", "parent", "jobs"];

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

pub fn module() -> Result<HandlerSet, RouteError> {
    HandlerSet::new(MODULE)
        .post("/register", register)
        .post("/login", login)
        .post("/logout", logout)
        .get("/me", me)
        .validate()
}

/// POST /register - create a user record and persist it
pub async fn register(State(state): State<AppState>, Json(body): Json<Registration>) -> ApiResult<Value> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let role = body.role.as_deref().unwrap_or("student");
    if !ROLES.contains(&role) {
        return Err(ApiError::bad_request(format!(
            "role must be one of: {}",
            ROLES.join(", ")
        )));
    }

    let record = json!({
        "id": Uuid::new_v4().to_string(),
        "username": username,
        "role": role,
        "passwordHash": hash_password(body.password).await?,
        "createdAt": Utc::now(),
    });
    let public = public_user(&record);

    state
        .store
        .update(|doc| {
            if doc.find_user("username", username).is_some() {
                return Err(ApiError::conflict(format!("username '{}' is already taken", username)));
            }
            doc.users.push(record);
            Ok(())
        })
        .await?;

    info!(user = %username, role, "Registered user");
    Ok(ApiResponse::created(public))
}

/// POST /login - check credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(body): Json<Credentials>,
) -> ApiResult<Value> {
    let stored = state
        .store
        .snapshot()
        .await
        .find_user("username", &body.username)
        .and_then(|record| record.get("passwordHash"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let verified = match stored {
        Some(stored) => verify_password(stored, body.password).await?,
        None => false,
    };
    if !verified {
        return Err(ApiError::unauthorized("invalid username or password"));
    }

    let created = session.login(body.username).await;
    info!(user = %created.user_ref, "User logged in");
    Ok(ApiResponse::success(json!({
        "user": created.user_ref,
        "expiresAt": created.expires_at,
    })))
}

/// POST /logout - end the current session, if any
pub async fn logout(Extension(session): Extension<SessionHandle>) -> ApiResult<Value> {
    let ended = session.logout().await;
    Ok(ApiResponse::success(json!({ "loggedOut": ended })))
}

/// GET /me - the signed-in user's record
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> ApiResult<Value> {
    let user = session
        .user()
        .await
        .ok_or_else(|| ApiError::unauthorized("not signed in"))?;

    let doc = state.store.snapshot().await;
    let record = doc
        .find_user("username", &user)
        .ok_or_else(|| ApiError::not_found(format!("user '{}' no longer exists", user)))?;
    Ok(ApiResponse::success(public_user(record)))
}

/// Argon2id PHC string for `password`, with a fresh random salt.
async fn hash_password(password: String) -> Result<String, ApiError> {
    blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::internal_server_error(format!("password hashing failed: {}", e)))
    })
    .await
}

/// Check `password` against a stored PHC string. Unparseable hashes never match.
async fn verify_password(stored: String, password: String) -> Result<bool, ApiError> {
    blocking(move || {
        Ok(PasswordHash::new(&stored)
            .map(|hash| Argon2::default().verify_password(password.as_bytes(), &hash).is_ok())
            .unwrap_or(false))
    })
    .await
}

/// Run CPU-heavy work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal_server_error(format!("password task failed: {}", e)))?
}

/// The record without its credential fields.
fn public_user(record: &Value) -> Value {
    let mut public = record.clone();
    if let Some(fields) = public.as_object_mut() {
        fields.remove("passwordHash");
    }
    public
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn password_round_trip() {
        let stored = hash_password("hunter2".to_string()).await.unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password(stored.clone(), "hunter2".to_string()).await.unwrap());
        assert!(!verify_password(stored, "hunter3".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_gets_distinct_hashes() {
        let first = hash_password("hunter2".to_string()).await.unwrap();
        let second = hash_password("hunter2".to_string()).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string".to_string(), "".to_string()).await.unwrap());
    }

    #[test]
    fn public_user_strips_credentials() {
        let public = public_user(&json!({ "username": "ada", "passwordHash": "$argon2id$..." }));
        assert_eq!(public, json!({ "username": "ada" }));
    }
}
