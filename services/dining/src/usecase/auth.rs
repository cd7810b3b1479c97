use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use uuid::Uuid;

use canteen_auth_types::token::issue_session_token;
use canteen_domain::role::Role;

use crate::domain::repository::PrincipalRepository;
use crate::domain::types::{Principal, PrincipalKind, StudentProfile};
use crate::domain::validate::{Violations, is_email, non_blank, normalize_id_card};
use crate::error::DiningError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> Result<String, DiningError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hash password: {e}"))?;
    Ok(hash.to_string())
}

/// `false` for a wrong password or an unparseable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn issue_session(principal: &Principal, secret: &str) -> Result<String, DiningError> {
    let (token, _) = issue_session_token(principal.id, &principal.email, principal.role(), secret)
        .map_err(|e| DiningError::Internal(e.into()))?;
    Ok(token)
}

/// A principal plus a freshly signed session token.
#[derive(Debug)]
pub struct SignedIn {
    pub principal: Principal,
    pub session_token: String,
}

// ── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: String,
    pub student_id: Option<String>,
    pub department: Option<String>,
    pub id_card_number: Option<String>,
    /// Data URLs.
    pub photo: Option<String>,
    pub id_card: Option<String>,
}

/// Public self-registration. Always creates a STUDENT.
pub struct RegisterUseCase<P: PrincipalRepository> {
    pub principals: P,
    pub jwt_secret: String,
}

impl<P: PrincipalRepository> RegisterUseCase<P> {
    pub async fn execute(&self, input: RegisterInput) -> Result<SignedIn, DiningError> {
        let email = input.email.trim().to_owned();
        let name = input.name.trim().to_owned();
        let student_id = non_blank(input.student_id);
        let id_card_number = input.id_card_number.as_deref().and_then(normalize_id_card);

        let mut violations = Violations::new();
        violations
            .check(is_email(&email), "email", "invalid email address")
            .check(
                input.password.chars().count() >= MIN_PASSWORD_LEN,
                "password",
                "must be at least 6 characters",
            )
            .check(
                name.chars().count() >= MIN_NAME_LEN,
                "name",
                "must be at least 2 characters",
            )
            .check(student_id.is_some(), "studentId", "required");
        violations.into_result()?;
        let student_id = student_id.ok_or_else(|| DiningError::invalid("studentId", "required"))?;

        if self.principals.find_by_email(&email).await?.is_some() {
            return Err(DiningError::EmailTaken);
        }
        if self
            .principals
            .find_student_by_student_id(&student_id)
            .await?
            .is_some()
        {
            return Err(DiningError::StudentIdTaken);
        }
        if let Some(card) = &id_card_number {
            if self.principals.find_student_by_id_card(card).await?.is_some() {
                return Err(DiningError::IdCardTaken);
            }
        }

        let now = Utc::now();
        let principal = Principal {
            id: Uuid::now_v7(),
            email,
            name,
            password_hash: hash_password(&input.password)?,
            kind: PrincipalKind::Student(StudentProfile {
                student_id,
                department: non_blank(input.department),
                photo: input.photo,
                id_card: input.id_card,
                face_id: None,
                id_card_number,
                pin: None,
                enrolled_at: now,
            }),
            created_at: now,
            updated_at: now,
        };
        // The repository re-checks uniqueness at insert time.
        self.principals.create(&principal).await?;
        tracing::info!(principal_id = %principal.id, "student registered");

        let session_token = issue_session(&principal, &self.jwt_secret)?;
        Ok(SignedIn {
            principal,
            session_token,
        })
    }
}

// ── Login ────────────────────────────────────────────────────────────────────

pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

pub struct LoginUseCase<P: PrincipalRepository> {
    pub principals: P,
    pub jwt_secret: String,
}

impl<P: PrincipalRepository> LoginUseCase<P> {
    pub async fn execute(&self, input: LoginInput) -> Result<SignedIn, DiningError> {
        let principal = self
            .principals
            .find_by_email(input.email.trim())
            .await?
            .ok_or(DiningError::InvalidCredentials)?;

        if !verify_password(&input.password, &principal.password_hash) {
            return Err(DiningError::InvalidCredentials);
        }
        if input.role.is_some_and(|role| role != principal.role()) {
            return Err(DiningError::RoleMismatch);
        }

        let session_token = issue_session(&principal, &self.jwt_secret)?;
        Ok(SignedIn {
            principal,
            session_token,
        })
    }
}

// ── Current principal ────────────────────────────────────────────────────────

pub struct CurrentPrincipalUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> CurrentPrincipalUseCase<P> {
    /// A session whose principal was deleted is no longer valid.
    pub async fn execute(&self, principal_id: Uuid) -> Result<Principal, DiningError> {
        self.principals
            .find_by_id(principal_id)
            .await?
            .ok_or(DiningError::Unauthorized)
    }
}
