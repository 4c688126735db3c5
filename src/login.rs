use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, create_dir_all};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Registered account of an instrumentist
///
/// Only the Argon2 hash of the password is ever stored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Disabled accounts keep their data but cannot log in
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// Successful login: the bearer token to send on protected routes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

/// Check a username before it is stored
///
/// Usernames are 1 to 32 characters of letters, digits, `.`, `_` or `-`.
///
/// # Examples
/// ```
/// use calreport::login::validate_username;
///
/// assert!(validate_username("j.perez").is_ok());
/// assert!(validate_username("bad name").is_err());
/// ```
pub fn validate_username(username: &str) -> AuthResult<()> {
    static USERNAME: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let valid = USERNAME
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]{1,32}$"))
        .as_ref()
        .is_ok_and(|pattern| pattern.is_match(username));

    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(format!(
            "username '{}' must be 1-32 letters, digits, '.', '_' or '-'",
            username
        )))
    }
}

/// Hash a password using Argon2
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `AuthResult<String>` - The PHC-formatted hash
fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => Err(AuthError::Hash(e.to_string())),
    }
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `AuthResult<bool>` - True if the password matches; an error only when the
///   stored hash is malformed
fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// JSON file of registered users, keyed by username
///
/// Writes are serialised through an internal lock so concurrent registrations
/// cannot overwrite each other.
pub struct UserStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory and an empty users file if missing
    pub fn init(&self) -> AuthResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                create_dir_all(dir).map_err(|e| AuthError::storage(e.to_string()))?;
            }
        }

        if !self.path.exists() {
            let mut file = File::create(&self.path).map_err(|e| AuthError::storage(e.to_string()))?;
            file.write_all(b"{}")
                .map_err(|e| AuthError::storage(e.to_string()))?;
        }

        Ok(())
    }

    /// Read all registered users; a missing file reads as no users
    pub fn users(&self) -> AuthResult<HashMap<String, User>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let mut file = File::open(&self.path)
            .map_err(|e| AuthError::storage(format!("failed to open users file: {}", e)))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AuthError::storage(format!("failed to read users file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| AuthError::storage(format!("failed to parse users data: {}", e)))
    }

    fn save_users(&self, users: &HashMap<String, User>) -> AuthResult<()> {
        let json = serde_json::to_string_pretty(users)
            .map_err(|e| AuthError::storage(format!("failed to serialize users data: {}", e)))?;

        fs::write(&self.path, json)
            .map_err(|e| AuthError::storage(format!("failed to write users data: {}", e)))
    }

    pub fn find(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self.users()?.remove(username))
    }

    /// Register a new, active user
    ///
    /// # Errors
    /// * `InvalidInput` if the username is malformed or the password empty
    /// * `UserExists` if the username is taken
    pub fn register_user(&self, username: &str, password: &str) -> AuthResult<User> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password cannot be empty".to_string()));
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuthError::storage("user store lock poisoned"))?;

        let mut users = self.users()?;
        if users.contains_key(username) {
            return Err(AuthError::UserExists);
        }

        let now = Utc::now();
        let user = User {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            active: true,
            created_at: now,
            updated_at: now,
        };

        users.insert(username.to_string(), user.clone());
        self.save_users(&users)?;

        log::info!("registered user {}", username);
        Ok(user)
    }

    /// Create the administrator account unless it already exists
    ///
    /// Returns `true` when a new account was written.
    pub fn seed_admin(&self, username: &str, password: &str) -> AuthResult<bool> {
        match self.register_user(username, password) {
            Ok(_) => {
                log::info!("seeded administrator account {}", username);
                Ok(true)
            }
            Err(AuthError::UserExists) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Enable or disable an account
    pub fn set_active(&self, username: &str, active: bool) -> AuthResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuthError::storage("user store lock poisoned"))?;

        let mut users = self.users()?;
        let user = users
            .get_mut(username)
            .ok_or_else(|| AuthError::InvalidInput(format!("unknown user '{}'", username)))?;
        user.active = active;
        user.updated_at = Utc::now();

        self.save_users(&users)
    }

    /// Check credentials, returning the matching active user
    pub fn verify_user(&self, username: &str, password: &str) -> AuthResult<User> {
        let user = self.find(username)?.ok_or(AuthError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::Unauthorized);
        }
        if !user.active {
            return Err(AuthError::InactiveUser);
        }

        Ok(user)
    }
}

/// An issued login token
#[derive(Debug, Clone)]
struct Session {
    username: String,
    expires_at: SystemTime,
}

// 9999-12-31T23:59:59Z, used when a lifetime would overflow the clock
const FAR_FUTURE_SECS: u64 = 253_402_300_799;

/// In-memory bearer tokens with a fixed lifetime
pub struct TokenStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a new random token for `username`
    pub fn issue(&self, username: &str) -> AuthResult<String> {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            username: username.to_string(),
            expires_at: SystemTime::now()
                .checked_add(self.ttl)
                .unwrap_or_else(|| SystemTime::UNIX_EPOCH + Duration::from_secs(FAR_FUTURE_SECS)),
        };

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| AuthError::storage("token store lock poisoned"))?;
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(token.clone(), session);

        Ok(token)
    }

    /// Username of a live token, `None` if unknown or expired
    pub fn validate(&self, token: &str) -> Option<String> {
        let sessions = self.sessions.read().ok()?;

        sessions
            .get(token)
            .filter(|session| session.expires_at > SystemTime::now())
            .map(|session| session.username.clone())
    }

    /// Forget a token; returns whether it was known
    pub fn revoke(&self, token: &str) -> bool {
        match self.sessions.write() {
            Ok(mut sessions) => sessions.remove(token).is_some(),
            Err(_) => false,
        }
    }
}

/// Login flow over a user store and a token store
pub struct Authenticator {
    users: UserStore,
    tokens: TokenStore,
}

impl Authenticator {
    pub fn new(users: UserStore, tokens: TokenStore) -> Self {
        Self { users, tokens }
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// Exchange credentials for a bearer token
    ///
    /// # Errors
    /// * `InvalidInput` when either field is empty
    /// * `Unauthorized` for an unknown user or a wrong password
    /// * `InactiveUser` for a disabled account
    pub fn authenticate(&self, request: &LoginRequest) -> AuthResult<LoginResponse> {
        if request.username.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidInput(
                "username and password cannot be empty".to_string(),
            ));
        }

        match self.users.verify_user(&request.username, &request.password) {
            Ok(user) => {
                let token = self.tokens.issue(&user.username)?;
                log::info!("user {} logged in", user.username);
                Ok(LoginResponse {
                    token,
                    username: user.username,
                })
            }
            Err(e) => {
                log::warn!("login rejected for {}: {}", request.username, e);
                Err(e)
            }
        }
    }

    pub fn validate_token(&self, token: &str) -> Option<String> {
        let username = self.tokens.validate(token);
        if username.is_none() {
            log::warn!("rejected unknown or expired token");
        }
        username
    }

    pub fn revoke_token(&self, token: &str) -> bool {
        self.tokens.revoke(token)
    }
}
