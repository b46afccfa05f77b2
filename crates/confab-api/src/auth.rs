use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use confab_db::Database;
use confab_gateway::presence::PresenceTable;
use confab_types::api::{
    AuthResponse, Claims, LoginRequest, SignupRequest, UpdateProfileRequest, UserResponse,
};
use confab_types::models::User;

use crate::assets::AssetStore;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub presence: PresenceTable,
    pub assets: AssetStore,
}

/// Tokens expire after this many days; there is no server-side revocation.
const TOKEN_LIFETIME_DAYS: i64 = 7;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    // An absent field counts as blank
    let fullname = req.fullname.unwrap_or_default();
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();
    let bio = req.bio.unwrap_or_default();

    if fullname.trim().is_empty()
        || email.trim().is_empty()
        || password.is_empty()
        || bio.trim().is_empty()
    {
        return Err(ApiError::Validation("All fields are required".into()));
    }

    let email = normalize_email(&email);

    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let inserted = state.db.create_user(
        &user_id.to_string(),
        &email,
        &password_hash,
        &fullname,
        &bio,
        &confab_db::format_timestamp(now),
    );
    if let Err(e) = inserted {
        // Two signups racing past the existence check meet the UNIQUE index
        // here; report it the same way as the explicit check.
        if confab_db::is_constraint_violation(&e) {
            return Err(ApiError::Conflict("User already exists".into()));
        }
        return Err(e.into());
    }

    let user = User {
        id: user_id,
        email,
        fullname,
        bio,
        avatar_url: None,
        created_at: now,
    };
    let token = create_token(&state.jwt_secret, user_id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user,
            token,
            message: "User registered successfully".into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let password = req.password.unwrap_or_default();

    // Unknown email, absent fields, and wrong password must all be
    // indistinguishable.
    let row = state
        .db
        .get_user_by_email(&email)?
        .ok_or_else(|| ApiError::Auth("Invalid credentials".into()))?;

    let parsed_hash = PasswordHash::new(&row.password)
        .map_err(|e| anyhow::anyhow!("stored password hash unreadable: {}", e))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Auth("Invalid credentials".into()))?;

    let user = row.into_user();
    let token = create_token(&state.jwt_secret, user.id)?;

    Ok(Json(AuthResponse {
        success: true,
        user,
        token,
        message: "Logged in successfully".into(),
    }))
}

/// GET /api/auth/check -- the middleware already validated the token, so
/// this only resolves the subject back to a full user record.
pub async fn check(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or_else(|| ApiError::Auth("User not found".into()))?
        .into_user();

    Ok(Json(UserResponse { success: true, user }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    // Resolve the avatar payload to a stored URL first; only the URL is
    // ever persisted.
    let avatar_url = match req.avatar.as_deref() {
        Some(data_uri) => Some(state.assets.store_data_uri(data_uri).await?),
        None => None,
    };

    let row = state
        .db
        .update_user_profile(
            &claims.sub.to_string(),
            req.fullname.as_deref(),
            req.bio.as_deref(),
            avatar_url.as_deref(),
        )?
        .ok_or_else(|| ApiError::Auth("User not found".into()))?;

    Ok(Json(UserResponse {
        success: true,
        user: row.into_user(),
    }))
}

fn create_token(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Emails compare case- and whitespace-insensitively everywhere.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
