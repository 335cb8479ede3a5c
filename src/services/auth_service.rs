use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::Settings;
use crate::models::{Identity, LoginRequest, Role, SignupRequest, UserRecord};
use crate::store::DataSource;
use crate::utils::error::AppError;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserRecord,
    pub role: Role,
    /// Landing page for the user's role
    pub redirect: String,
}

/// Signs and checks session tokens, hashes passwords
#[derive(Clone)]
pub struct Authenticator {
    secret: String,
    issuer: String,
    audience: String,
    session_ttl_secs: i64,
    hash_cost: u32,
}

impl Authenticator {
    pub fn new(secret: &str, issuer: &str, audience: &str, session_ttl_secs: i64, hash_cost: u32) -> Self {
        Self {
            secret: secret.to_string(),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            session_ttl_secs,
            hash_cost,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.jwt_secret,
            &settings.jwt_issuer,
            &settings.jwt_audience,
            settings.session_max_age_secs,
            settings.bcrypt_cost,
        )
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_secs
    }

    pub fn issue_token(&self, user: &UserRecord) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp() as usize,
            exp: (now + Duration::seconds(self.session_ttl_secs)).timestamp() as usize,
            jti: uuid::Uuid::new_v4().to_string(),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| AppError::Auth(format!("Failed to generate token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.leeway = 0;

        let mut issuers = HashSet::new();
        issuers.insert(self.issuer.clone());
        validation.iss = Some(issuers);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Mutation(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AppError::Mutation(format!("Failed to hash password: {}", e)))
    }

    pub async fn check_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Auth(format!("Password verification task failed: {}", e)))?
            .map_err(|e| AppError::Auth(format!("Password verification error: {}", e)))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_response(auth: &Authenticator, user: UserRecord) -> Result<AuthResponse, AppError> {
    let token = auth.issue_token(&user)?;
    Ok(AuthResponse {
        success: true,
        token,
        role: user.role,
        redirect: user.role.landing_path().to_string(),
        user,
    })
}

pub async fn login(
    store: &dyn DataSource,
    auth: &Authenticator,
    request: &LoginRequest,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&request.email);
    let invalid = || AppError::Auth("Invalid credentials".to_string());

    let identity = store.find_identity(&email).await?.ok_or_else(invalid)?;

    if !auth.check_password(&request.password, &identity.password_hash).await? {
        return Err(invalid());
    }

    // An identity without a profile document still logs in, as a plain user
    let user = match store.get_user(&identity.id).await? {
        Some(user) => user,
        None => {
            log::warn!("⚠️ Identity {} has no profile, defaulting to user role", identity.id);
            UserRecord {
                id: identity.id.clone(),
                name: String::new(),
                email: identity.email.clone(),
                phone: String::new(),
                address: String::new(),
                role: Role::User,
            }
        }
    };

    session_response(auth, user)
}

/// Creates identity and profile in one step. New accounts always get `Role::User`.
pub async fn signup(
    store: &dyn DataSource,
    auth: &Authenticator,
    request: &SignupRequest,
) -> Result<AuthResponse, AppError> {
    request.validate()?;
    let email = normalize_email(&request.email);

    if store.find_identity(&email).await?.is_some() {
        return Err(AppError::Conflict(format!("{} is already registered", email)));
    }

    let password_hash = auth.hash_password(&request.password).await?;
    let id = ObjectId::new().to_hex();

    let identity = Identity {
        id: id.clone(),
        email: email.clone(),
        password_hash,
        created_at: Utc::now().timestamp(),
    };
    let profile = UserRecord {
        id,
        name: request.name.trim().to_string(),
        email,
        phone: request.phone.trim().to_string(),
        address: request.address.trim().to_string(),
        role: Role::User,
    };

    let user = store.create_account(identity, profile).await?;
    log::info!("✅ User registered: {} ({})", user.email, user.id);

    session_response(auth, user)
}

/// Promotes an existing account to admin, creating it first if needed
pub async fn ensure_admin(
    store: &dyn DataSource,
    auth: &Authenticator,
    email: &str,
    password: &str,
) -> Result<UserRecord, AppError> {
    let email = normalize_email(email);
    let id = match store.find_identity(&email).await? {
        Some(identity) => identity.id,
        None => {
            let request = SignupRequest {
                name: "Administrator".to_string(),
                email: email.clone(),
                password: password.to_string(),
                address: String::new(),
                phone: String::new(),
            };
            signup(store, auth, &request).await?.user.id
        }
    };

    let patch = crate::models::UserPatch {
        role: Some(Role::Admin),
        ..Default::default()
    };
    store.update_user(&id, &patch).await
}

pub async fn current_user(store: &dyn DataSource, claims: &Claims) -> Result<UserRecord, AppError> {
    store
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", claims.sub)))
}
