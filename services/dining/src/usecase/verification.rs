use chrono::{FixedOffset, Utc};
use uuid::Uuid;

use canteen_domain::calendar::day_window;
use canteen_domain::meal::VerificationMethod;

use crate::domain::repository::{EntitlementRepository, MealRecordRepository, PrincipalRepository};
use crate::domain::types::{Entitlement, MealQuery, MealRecord, Principal, StudentSummary};
use crate::domain::validate::{Violations, non_blank, normalize_id_card};
use crate::error::DiningError;

pub const REASON_ALREADY_SERVED: &str = "Already received meal today";
pub const REASON_NO_ENTITLEMENT: &str = "No active tokens or meal plans";

/// Result of trying to open a PENDING record for a student.
#[derive(Debug)]
pub enum Opened {
    Created(MealRecord, Entitlement),
    AlreadyServed,
    NoEntitlement,
}

/// Shared eligibility path: served-today check, entitlement lookup, then a
/// PENDING record created under the student's row lock.
pub async fn open_pending<E, M>(
    entitlements: &E,
    meals: &M,
    student_id: Uuid,
    method: VerificationMethod,
    offset: FixedOffset,
) -> Result<Opened, DiningError>
where
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    let now = Utc::now();
    let today = day_window(now, offset);

    let served = meals
        .count(&MealQuery {
            student_id: Some(student_id),
            completed_in: Some(today),
            ..MealQuery::served()
        })
        .await?;
    if served > 0 {
        return Ok(Opened::AlreadyServed);
    }

    let Some(entitlement) = entitlements.find_entitlement(student_id, now).await? else {
        return Ok(Opened::NoEntitlement);
    };

    let record = MealRecord::pending(student_id, entitlement.reference(), method, now);
    match meals.create_pending(&record, today).await {
        Ok(()) => Ok(Opened::Created(record, entitlement)),
        // Lost a race with an approval for the same student.
        Err(DiningError::AlreadyServedToday) => Ok(Opened::AlreadyServed),
        Err(e) => Err(e),
    }
}

// ── Verify (gateway) ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct VerifyInput {
    pub method: Option<VerificationMethod>,
    pub face_id: Option<String>,
    pub id_card_number: Option<String>,
    pub pin: Option<String>,
}

/// The single credential a verify request resolves through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Face(String),
    IdCard(String),
    Pin(String),
}

impl Credential {
    pub fn method(&self) -> VerificationMethod {
        match self {
            Self::Face(_) => VerificationMethod::Face,
            Self::IdCard(_) => VerificationMethod::IdCard,
            Self::Pin(_) => VerificationMethod::Pin,
        }
    }
}

impl VerifyInput {
    pub fn face(face_id: impl Into<String>) -> Self {
        Self {
            method: Some(VerificationMethod::Face),
            face_id: Some(face_id.into()),
            ..Default::default()
        }
    }

    /// Exactly one credential, and it must belong to the method.
    pub fn credential(self) -> Result<Credential, DiningError> {
        let face_id = non_blank(self.face_id);
        let id_card_number = non_blank(self.id_card_number);
        let pin = non_blank(self.pin);

        let Some(method) = self.method else {
            return Err(DiningError::invalid("method", "required"));
        };

        let mut violations = Violations::new();
        let expected = match method {
            VerificationMethod::Face => "faceId",
            VerificationMethod::IdCard => "idCardNumber",
            VerificationMethod::Pin => "pin",
            VerificationMethod::Manual => {
                return Err(DiningError::invalid(
                    "method",
                    "MANUAL is not accepted by the verification gateway",
                ));
            }
        };
        for (field, present) in [
            ("faceId", face_id.is_some()),
            ("idCardNumber", id_card_number.is_some()),
            ("pin", pin.is_some()),
        ] {
            if field == expected {
                violations.check(present, field, &format!("required for {method} verification"));
            } else {
                violations.check(!present, field, &format!("not allowed for {method} verification"));
            }
        }
        violations.into_result()?;

        // Presence of the expected field was checked above.
        let credential = match method {
            VerificationMethod::Face => face_id.map(Credential::Face),
            VerificationMethod::IdCard => id_card_number
                .as_deref()
                .and_then(normalize_id_card)
                .map(Credential::IdCard),
            VerificationMethod::Pin => pin.map(Credential::Pin),
            VerificationMethod::Manual => None,
        };
        credential.ok_or_else(|| DiningError::invalid(expected, "required"))
    }
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub student: StudentSummary,
    pub eligible: bool,
    pub reason: Option<&'static str>,
    pub meal_record_id: Option<Uuid>,
    pub token_number: Option<String>,
    pub meal_plan: Option<String>,
}

impl VerifyOutcome {
    fn ineligible(student: &Principal, reason: &'static str) -> Self {
        Self {
            student: student.summary(),
            eligible: false,
            reason: Some(reason),
            meal_record_id: None,
            token_number: None,
            meal_plan: None,
        }
    }
}

pub struct VerifyUseCase<P, E, M>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub principals: P,
    pub entitlements: E,
    pub meals: M,
    pub offset: FixedOffset,
}

impl<P, E, M> VerifyUseCase<P, E, M>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub async fn execute(&self, input: VerifyInput) -> Result<VerifyOutcome, DiningError> {
        let credential = input.credential()?;
        let method = credential.method();

        let student = match &credential {
            Credential::Face(face_id) => self.principals.find_student_by_face_id(face_id).await?,
            Credential::IdCard(card) => self.principals.find_student_by_id_card(card).await?,
            Credential::Pin(pin) => self.principals.find_student_by_pin(pin).await?,
        }
        .ok_or(DiningError::StudentNotFound)?;

        let outcome = match open_pending(
            &self.entitlements,
            &self.meals,
            student.id,
            method,
            self.offset,
        )
        .await?
        {
            Opened::AlreadyServed => VerifyOutcome::ineligible(&student, REASON_ALREADY_SERVED),
            Opened::NoEntitlement => VerifyOutcome::ineligible(&student, REASON_NO_ENTITLEMENT),
            Opened::Created(record, entitlement) => {
                let (token_number, meal_plan) = match entitlement {
                    Entitlement::Token(token) => (Some(token.token_number), None),
                    Entitlement::Enrollment(_, plan) => (None, Some(plan.name)),
                };
                VerifyOutcome {
                    student: student.summary(),
                    eligible: true,
                    reason: None,
                    meal_record_id: Some(record.id),
                    token_number,
                    meal_plan,
                }
            }
        };
        tracing::info!(
            student = %student.id,
            %method,
            eligible = outcome.eligible,
            "verification"
        );
        Ok(outcome)
    }
}

// ── Student self-request ─────────────────────────────────────────────────────

pub struct RequestMealUseCase<P, E, M>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub principals: P,
    pub entitlements: E,
    pub meals: M,
    pub offset: FixedOffset,
}

impl<P, E, M> RequestMealUseCase<P, E, M>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub async fn execute(
        &self,
        student_id: Uuid,
        method: VerificationMethod,
    ) -> Result<MealRecord, DiningError> {
        let student = self
            .principals
            .find_by_id(student_id)
            .await?
            .ok_or(DiningError::StudentNotFound)?;
        if student.student().is_none() {
            return Err(DiningError::StudentNotFound);
        }

        match open_pending(
            &self.entitlements,
            &self.meals,
            student_id,
            method,
            self.offset,
        )
        .await?
        {
            Opened::Created(record, _) => Ok(record),
            Opened::AlreadyServed => Err(DiningError::AlreadyServedToday),
            Opened::NoEntitlement => Err(DiningError::NoEntitlement),
        }
    }
}
