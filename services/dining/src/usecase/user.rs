use chrono::Utc;
use uuid::Uuid;

use canteen_domain::role::Role;

use crate::domain::repository::PrincipalRepository;
use crate::domain::types::{CredentialChanges, Principal, PrincipalChanges, PrincipalKind};
use crate::domain::validate::{Violations, is_email, non_blank, normalize_id_card};
use crate::error::DiningError;
use crate::usecase::auth::{MIN_NAME_LEN, MIN_PASSWORD_LEN, hash_password};

// ── List ─────────────────────────────────────────────────────────────────────

pub struct ListUsersUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> ListUsersUseCase<P> {
    pub async fn execute(&self) -> Result<Vec<Principal>, DiningError> {
        self.principals.list().await
    }
}

// ── Create staff ─────────────────────────────────────────────────────────────

pub struct CreateStaffInput {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// Admin-only creation of ADMIN and MANAGER accounts.
pub struct CreateStaffUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> CreateStaffUseCase<P> {
    pub async fn execute(&self, input: CreateStaffInput) -> Result<Principal, DiningError> {
        let email = input.email.trim().to_owned();
        let name = input.name.trim().to_owned();
        let mut v = Violations::new();
        v.check(is_email(&email), "email", "invalid email address")
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
            .check(
                input.role != Role::Student,
                "role",
                "students register through /api/auth/register",
            );
        v.into_result()?;

        if self.principals.find_by_email(&email).await?.is_some() {
            return Err(DiningError::EmailTaken);
        }

        let now = Utc::now();
        let principal = Principal {
            id: Uuid::now_v7(),
            email,
            name,
            password_hash: hash_password(&input.password)?,
            kind: match input.role {
                Role::Admin => PrincipalKind::Admin,
                _ => PrincipalKind::Manager,
            },
            created_at: now,
            updated_at: now,
        };
        self.principals.create(&principal).await?;
        tracing::info!(principal_id = %principal.id, role = %input.role, "staff account created");
        Ok(principal)
    }
}

// ── Admin update ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
    /// `Some(None)` clears the card.
    pub id_card_number: Option<Option<String>>,
}

pub struct UpdateUserUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> UpdateUserUseCase<P> {
    pub async fn execute(&self, id: Uuid, input: UpdateUserInput) -> Result<Principal, DiningError> {
        let principal = self
            .principals
            .find_by_id(id)
            .await?
            .ok_or(DiningError::UserNotFound)?;
        let is_student = principal.student().is_some();

        let email = input.email.map(|e| e.trim().to_owned());
        let student_id = input.student_id.map(|s| s.trim().to_owned());
        let mut v = Violations::new();
        v.check(
            input.name.as_deref().is_none_or(|n| !n.trim().is_empty()),
            "name",
            "must not be empty",
        )
        .check(
            email.as_deref().is_none_or(is_email),
            "email",
            "invalid email address",
        )
        .check(
            input
                .password
                .as_deref()
                .is_none_or(|p| p.chars().count() >= MIN_PASSWORD_LEN),
            "password",
            "must be at least 6 characters",
        )
        .check(
            student_id.as_deref().is_none_or(|s| !s.is_empty()),
            "studentId",
            "must not be empty",
        );
        for (field, present) in [
            ("department", input.department.is_some()),
            ("studentId", student_id.is_some()),
            ("idCardNumber", input.id_card_number.is_some()),
        ] {
            v.check(is_student || !present, field, "only applies to students");
        }
        v.into_result()?;

        if let Some(email) = &email {
            if let Some(other) = self.principals.find_by_email(email).await? {
                if other.id != id {
                    return Err(DiningError::EmailTaken);
                }
            }
        }
        if let Some(student_id) = &student_id {
            if let Some(other) = self.principals.find_student_by_student_id(student_id).await? {
                if other.id != id {
                    return Err(DiningError::StudentIdTaken);
                }
            }
        }
        let id_card_number = match input.id_card_number {
            None => None,
            Some(raw) => {
                let card = raw.as_deref().and_then(normalize_id_card);
                if let Some(card) = &card {
                    if let Some(other) = self.principals.find_student_by_id_card(card).await? {
                        if other.id != id {
                            return Err(DiningError::IdCardTaken);
                        }
                    }
                }
                Some(card)
            }
        };

        let changes = PrincipalChanges {
            name: input.name.map(|n| n.trim().to_owned()),
            email,
            password_hash: input.password.as_deref().map(hash_password).transpose()?,
            department: input.department,
            student_id,
            id_card_number,
        };
        self.principals
            .update(id, &changes)
            .await?
            .ok_or(DiningError::UserNotFound)
    }
}

// ── Delete ───────────────────────────────────────────────────────────────────

pub struct DeleteUserUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> DeleteUserUseCase<P> {
    pub async fn execute(&self, actor_id: Uuid, id: Uuid) -> Result<(), DiningError> {
        if actor_id == id {
            return Err(DiningError::CannotDeleteSelf);
        }
        if !self.principals.delete(id).await? {
            return Err(DiningError::UserNotFound);
        }
        tracing::info!(principal_id = %id, actor = %actor_id, "principal deleted");
        Ok(())
    }
}

// ── Student self-service ─────────────────────────────────────────────────────

/// Student edit of their own card number, PIN and face signature.
pub struct UpdateOwnCredentialsUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> UpdateOwnCredentialsUseCase<P> {
    pub async fn execute(
        &self,
        student_id: Uuid,
        changes: CredentialChanges,
    ) -> Result<Principal, DiningError> {
        let principal = self
            .principals
            .find_by_id(student_id)
            .await?
            .ok_or(DiningError::UserNotFound)?;
        if principal.student().is_none() {
            return Err(DiningError::Forbidden);
        }

        let changes = CredentialChanges {
            id_card_number: changes.id_card_number.as_deref().and_then(normalize_id_card),
            pin: non_blank(changes.pin),
            face_id: non_blank(changes.face_id),
        };
        if let Some(card) = &changes.id_card_number {
            if let Some(other) = self.principals.find_student_by_id_card(card).await? {
                if other.id != student_id {
                    return Err(DiningError::IdCardTaken);
                }
            }
        }
        if let Some(face_id) = &changes.face_id {
            if let Some(other) = self.principals.find_student_by_face_id(face_id).await? {
                if other.id != student_id {
                    return Err(DiningError::FaceIdTaken);
                }
            }
        }

        self.principals
            .update_credentials(student_id, &changes)
            .await?
            .ok_or(DiningError::UserNotFound)
    }
}
