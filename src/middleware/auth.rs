use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use crate::errors::{AppError, AppResult};
use crate::models::{Role, SubRole, User};
use crate::state::AppState;

const PUBLIC_PATHS: [&str; 2] = ["/health", "/api/auth/login"];

/// JWT payload. `sub` is the user's ObjectId in hex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub subrole: Option<SubRole>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User, ttl_hours: i64) -> AppResult<Self> {
        let id = user
            .id
            .ok_or_else(|| AppError::Auth("User has no id".into()))?;
        let now = Utc::now();
        Ok(Self {
            sub: id.to_hex(),
            name: user.name.clone(),
            role: user.role,
            subrole: user.subrole,
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
        })
    }

    pub fn user_id(&self) -> AppResult<ObjectId> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".into()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".into()))
        }
    }
}

/// Checks the token holder against the stored account. A deleted account
/// or a changed role invalidates the token before it expires.
pub fn ensure_current(claims: &Claims, user: Option<User>) -> AppResult<User> {
    let user = user.ok_or_else(|| AppError::Auth("Account no longer exists".into()))?;
    if user.role != claims.role || user.subrole != claims.subrole {
        tracing::info!("Stale token for {}: role is now {}", user.email, user.role);
        return Err(AppError::Auth("Account role changed, sign in again".into()));
    }
    Ok(user)
}

pub fn issue_token(claims: &Claims, secret: &str) -> AppResult<String> {
    Ok(encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Rejects requests without a valid bearer token and makes the decoded
/// [`Claims`] available to handlers as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path();

    if PUBLIC_PATHS.contains(&path) {
        return next.run(req).await;
    }

    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        tracing::debug!("Missing bearer token for {}", path);
        return AppError::Auth("Missing bearer token".into()).into_response();
    };

    match verify_token(bearer.token(), &state.config.auth.jwt_secret) {
        Ok(claims) => {
            tracing::trace!("Authenticated {} ({}) for {}", claims.sub, claims.role, path);
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Rejected token for {}: {}", path, e);
            e.into_response()
        }
    }
}
