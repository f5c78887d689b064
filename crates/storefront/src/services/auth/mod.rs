//! Authentication service.
//!
//! Accounts sign in with email and password. A successful signup or login
//! returns an HS256 token carrying [`TokenClaims`]; every protected route
//! verifies it with the same [`TokenSigner`].

mod error;

pub use error::AuthError;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use desh_perfume_core::{
    AuthResponse, Email, LoginRequest, SignupRequest, TokenClaims, UserId,
};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 50;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s]+$").expect("Invalid regex"));

// =============================================================================
// Tokens
// =============================================================================

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl,
        }
    }

    /// Sign a token for `user` expiring after the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenSigning` if encoding fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let claims = TokenClaims {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::TokenSigning)
    }

    /// Verify the signature and expiry of `token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed, signed
    /// with another key or expired.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Authentication service.
///
/// Handles user registration and login.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    signer: &'a TokenSigner,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, signer: &'a TokenSigner) -> Self {
        Self {
            users: UserRepository::new(pool),
            signer,
        }
    }

    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` with every failing field,
    /// `AuthError::UserAlreadyExists` if the email is taken, or a hashing,
    /// signing or database error.
    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, AuthError> {
        let (name, email) = validate_signup(request).map_err(AuthError::Validation)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&request.password)?;
        let user = self
            .users
            .create(&name, &email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User signed up");
        self.respond("User created successfully", &user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = Email::parse(&request.email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&request.password, &password_hash)?;

        tracing::info!(user_id = %user.id, "User logged in");
        self.respond("Login successful", &user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user does not exist.
    pub async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.users.get_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }

    fn respond(&self, message: &str, user: &User) -> Result<AuthResponse, AuthError> {
        Ok(AuthResponse {
            message: message.to_owned(),
            token: self.signer.issue(user)?,
            user: user.to_public(),
        })
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Check every signup field, collecting all failures.
///
/// On success returns the trimmed name and the normalized email.
///
/// # Errors
///
/// Returns a map from field name to message.
pub fn validate_signup(request: &SignupRequest) -> Result<(String, Email), BTreeMap<String, String>> {
    let mut errors = BTreeMap::new();

    let name = request.name.trim();
    if name.is_empty() {
        errors.insert("name".to_owned(), "Name is required.".to_owned());
    } else if !NAME_RE.is_match(name) {
        errors.insert(
            "name".to_owned(),
            "Name should only contain letters and spaces.".to_owned(),
        );
    } else if name.chars().count() > MAX_NAME_LENGTH {
        errors.insert(
            "name".to_owned(),
            format!("Name cannot exceed {MAX_NAME_LENGTH} characters."),
        );
    }

    let email = if request.email.trim().is_empty() {
        errors.insert("email".to_owned(), "Email is required.".to_owned());
        None
    } else {
        match Email::parse(&request.email) {
            Ok(email) => Some(email),
            Err(_) => {
                errors.insert("email".to_owned(), "Invalid email format.".to_owned());
                None
            }
        }
    };

    if request.password.is_empty() {
        errors.insert("password".to_owned(), "Password is required.".to_owned());
    } else if !is_strong_password(&request.password) {
        errors.insert(
            "password".to_owned(),
            format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters and include uppercase, lowercase, number, and special character."
            ),
        );
    }

    if request.password != request.confirm_password {
        errors.insert(
            "confirmPassword".to_owned(),
            "Passwords do not match.".to_owned(),
        );
    }

    match email {
        Some(email) if errors.is_empty() => Ok((name.to_owned(), email)),
        _ => Err(errors),
    }
}

/// At least eight characters with an uppercase letter, a lowercase letter,
/// a digit and a symbol.
fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

/// Hash a password with Argon2.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
