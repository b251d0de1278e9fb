use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{AdminStore, ProfileStore, ProgressStore};

/// Length of the coding challenge in days.
pub const CHALLENGE_DAYS: u32 = 45;

const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Administrator account: an email plus the Argon2 hash of the password.
/// Plaintext credentials are never stored.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AdminAccount {
    pub email: String,
    pub password_hash: String,
}

/// Student profile captured at signup and managed by administrators.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub enrollment_no: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub github_repo_link: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_status() -> String {
    "active".to_string()
}

/// Partial profile update submitted by an administrator; only the fields
/// present in the payload are applied.
#[derive(Clone, Deserialize, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub enrollment_no: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub section: Option<String>,
    pub semester: Option<String>,
    pub github_repo_link: Option<String>,
    pub status: Option<String>,
}

/// One row of the admin user listing. Streak, solved count and last-active
/// time are joined in from the progress store on every read rather than
/// trusted from a denormalized copy on the profile.
#[derive(Clone, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub streak: u32,
    pub problems_solved: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_date: Option<DateTime<Utc>>,
}

/// Aggregate platform statistics for the admin dashboard.
#[derive(Clone, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_users: u32,
    pub active_users: u32,
    pub total_problems: u32,
    pub total_submissions: u32,
    pub avg_streak: f64,
}

/// An authenticated administrator session.
#[derive(Debug, Clone)]
pub struct Session {
    pub admin_email: String,
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

/// Create a new session for an authenticated administrator.
///
/// # Returns
/// * `String` - A unique session id to hand back as a cookie
pub fn create_session(email: &str) -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        admin_email: email.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Validate a session id.
///
/// # Returns
/// * `Option<String>` - The administrator's email if the session is valid
///   and not expired, `None` otherwise
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(session_id) {
        if session.expires_at > SystemTime::now() {
            return Some(session.admin_email.clone());
        }
    }

    None
}

/// Administrative operations: credential verification behind the
/// authorization gate, user management and aggregate statistics.
pub struct AdminService {
    admins: Arc<dyn AdminStore>,
    profiles: Arc<dyn ProfileStore>,
    progress: Arc<dyn ProgressStore>,
}

impl AdminService {
    pub fn new(
        admins: Arc<dyn AdminStore>,
        profiles: Arc<dyn ProfileStore>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        AdminService {
            admins,
            profiles,
            progress,
        }
    }

    /// Register an administrator account. The password is hashed before it
    /// reaches the store.
    ///
    /// # Errors
    /// * `InvalidArgument` when email or password is empty
    pub fn register_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::invalid_argument(
                "email and password cannot be empty",
            ));
        }

        let password_hash = hash_password(password)?;
        self.admins.upsert(&AdminAccount {
            email: email.trim().to_string(),
            password_hash,
        })
    }

    /// Check whether the submitted credentials match a registered
    /// administrator. Unknown emails and wrong passwords both report `false`.
    pub fn verify_admin(&self, email: &str, password: &str) -> Result<bool, AppError> {
        match self.admins.get(email.trim())? {
            Some(account) => verify_password(password, &account.password_hash),
            None => Ok(false),
        }
    }

    /// Provision a first administrator from the environment when the admin
    /// store is empty. Reads `CODESTREAK_ADMIN_EMAIL` and
    /// `CODESTREAK_ADMIN_PASSWORD`; without them the store stays empty and
    /// every admin login is rejected.
    pub fn seed_from_env(&self) -> Result<(), AppError> {
        if !self.admins.is_empty()? {
            return Ok(());
        }

        match (
            env::var("CODESTREAK_ADMIN_EMAIL"),
            env::var("CODESTREAK_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                self.register_admin(&email, &password)?;
                log::info!("seeded administrator account for {email}");
            }
            _ => {
                log::warn!("no administrator accounts configured; admin logins will be rejected");
            }
        }

        Ok(())
    }

    /// Create or replace a student profile. A replacement keeps the original
    /// join date.
    pub fn upsert_profile(&self, mut profile: UserProfile) -> Result<(), AppError> {
        if profile.user_id.trim().is_empty() || profile.name.trim().is_empty() {
            return Err(AppError::invalid_argument("user_id and name are required"));
        }

        match self.profiles.get(&profile.user_id)? {
            Some(existing) => profile.created_at = existing.created_at,
            None => {
                if profile.created_at.is_none() {
                    profile.created_at = Some(Utc::now());
                }
            }
        }

        self.profiles.upsert(&profile)
    }

    /// List every user for the admin panel, joining live progress figures
    /// onto each profile.
    pub fn list_users(&self) -> Result<Vec<AdminUserView>, AppError> {
        let mut users = Vec::new();

        for profile in self.profiles.get_all()? {
            let progress = self.progress.get(&profile.user_id)?;
            let (streak, solved, last_active) = match &progress {
                Some(p) => (p.current_streak, p.total_solved, p.last_active_date),
                None => (0, 0, None),
            };

            let name = if profile.name.is_empty() {
                "Unknown".to_string()
            } else {
                profile.name.clone()
            };

            users.push(AdminUserView {
                id: profile.user_id,
                name,
                email: profile.email,
                streak,
                problems_solved: solved,
                last_active,
                status: profile.status,
                join_date: profile.created_at,
            });
        }

        Ok(users)
    }

    /// Aggregate statistics across all users.
    pub fn system_stats(&self) -> Result<SystemStats, AppError> {
        let users = self.list_users()?;

        let total_users = users.len() as u32;
        let active_users = users.iter().filter(|u| u.status == "active").count() as u32;
        let total_submissions = users.iter().map(|u| u.problems_solved).sum();
        let avg_streak = if users.is_empty() {
            0.0
        } else {
            users.iter().map(|u| u.streak as f64).sum::<f64>() / users.len() as f64
        };

        Ok(SystemStats {
            total_users,
            active_users,
            total_problems: CHALLENGE_DAYS,
            total_submissions,
            avg_streak,
        })
    }

    /// Apply a partial update to a user's profile.
    ///
    /// # Errors
    /// * `InvalidArgument` when the user does not exist
    pub fn update_user(&self, user_id: &str, update: ProfileUpdate) -> Result<(), AppError> {
        let mut profile = self
            .profiles
            .get(user_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("unknown user: {user_id}")))?;

        if let Some(name) = update.name {
            profile.name = name;
        }
        if let Some(enrollment_no) = update.enrollment_no {
            profile.enrollment_no = enrollment_no;
        }
        if let Some(email) = update.email {
            profile.email = email;
        }
        if let Some(phone) = update.phone {
            profile.phone = phone;
        }
        if let Some(course) = update.course {
            profile.course = course;
        }
        if let Some(section) = update.section {
            profile.section = section;
        }
        if let Some(semester) = update.semester {
            profile.semester = semester;
        }
        if let Some(github_repo_link) = update.github_repo_link {
            profile.github_repo_link = github_repo_link;
        }
        if let Some(status) = update.status {
            profile.status = status;
        }

        self.profiles.upsert(&profile)
    }

    /// Remove a user entirely: profile and progress record.
    pub fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::invalid_argument("userId is required"));
        }
        self.profiles.delete(user_id)?;
        self.progress.delete(user_id)
    }
}

/// Hash a password with Argon2id and a fresh random salt.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::internal("password hashing failed"))
}

/// Verify a password against a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::internal("invalid password hash format"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
