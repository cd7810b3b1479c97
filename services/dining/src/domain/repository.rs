#![allow(async_fn_in_trait)]

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use canteen_domain::calendar::Window;
use canteen_domain::pagination::Page;
use canteen_domain::role::Role;

use crate::domain::types::{
    CredentialChanges, Decision, Enrollment, EnrollmentView, Entitlement, MealPlan,
    MealPlanWithCount, MealQuery, MealRecord, MealRecordView, Principal, PrincipalChanges,
    SortOrder, Token,
};
use crate::error::DiningError;

/// Repository for admins, managers and students.
pub trait PrincipalRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, DiningError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DiningError>;

    async fn find_student_by_student_id(
        &self,
        student_id: &str,
    ) -> Result<Option<Principal>, DiningError>;

    async fn find_student_by_face_id(&self, face_id: &str)
    -> Result<Option<Principal>, DiningError>;

    async fn find_student_by_id_card(
        &self,
        id_card_number: &str,
    ) -> Result<Option<Principal>, DiningError>;

    /// PINs are not unique: returns the oldest student holding `pin`.
    async fn find_student_by_pin(&self, pin: &str) -> Result<Option<Principal>, DiningError>;

    /// Insert the principal and, for students, its profile in one transaction.
    /// Unique violations map to the matching `*Taken` error.
    async fn create(&self, principal: &Principal) -> Result<(), DiningError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<Principal>, DiningError>;

    /// Students that have a photo on file.
    async fn list_students_with_photo(&self) -> Result<Vec<Principal>, DiningError>;

    /// Apply an admin edit. Returns `None` if the principal does not exist.
    async fn update(
        &self,
        id: Uuid,
        changes: &PrincipalChanges,
    ) -> Result<Option<Principal>, DiningError>;

    /// Apply a student credential edit. Returns `None` if no such student.
    async fn update_credentials(
        &self,
        id: Uuid,
        changes: &CredentialChanges,
    ) -> Result<Option<Principal>, DiningError>;

    /// Returns `true` if deleted, `false` if not found.
    async fn delete(&self, id: Uuid) -> Result<bool, DiningError>;

    async fn count_by_role(&self, role: Role) -> Result<u64, DiningError>;
}

/// Repository for tokens and enrollments.
pub trait EntitlementRepository: Send + Sync {
    /// Token preferred over enrollment. Tokens: ACTIVE, unexpired, oldest
    /// purchase first. Enrollments: active with meals remaining.
    async fn find_entitlement(
        &self,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, DiningError>;

    /// Newest purchase first.
    async fn list_tokens(&self, student_id: Uuid) -> Result<Vec<Token>, DiningError>;

    /// Counts ACTIVE tokens, optionally for one student.
    async fn count_active_tokens(&self, student_id: Option<Uuid>) -> Result<u64, DiningError>;

    /// Insert an enrollment unless the student already has an active one
    /// (`ActiveEnrollmentExists`). Check and insert are serialized per student.
    async fn create_enrollment(&self, enrollment: &Enrollment) -> Result<(), DiningError>;

    /// Newest first.
    async fn list_enrollments(&self) -> Result<Vec<EnrollmentView>, DiningError>;

    /// Newest start first.
    async fn list_student_enrollments(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<(Enrollment, MealPlan)>, DiningError>;

    /// Returns the updated enrollment, `None` if not found.
    async fn deactivate_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>, DiningError>;

    /// Active enrollments with meals remaining for one student.
    async fn count_usable_enrollments(&self, student_id: Uuid) -> Result<u64, DiningError>;

    /// Students holding at least one active enrollment.
    async fn count_students_with_active_enrollment(&self) -> Result<u64, DiningError>;
}

/// Repository for meal plans.
pub trait MealPlanRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MealPlan>, DiningError>;

    /// Newest first, with the number of enrollments referencing each plan.
    async fn list_with_counts(&self) -> Result<Vec<MealPlanWithCount>, DiningError>;

    async fn create(&self, plan: &MealPlan) -> Result<(), DiningError>;

    async fn save(&self, plan: &MealPlan) -> Result<(), DiningError>;

    /// `MealPlanInUse` when enrollments reference it. Returns `false` if not found.
    async fn delete(&self, id: Uuid) -> Result<bool, DiningError>;

    async fn count_active(&self) -> Result<u64, DiningError>;
}

/// Repository for the meal record ledger.
pub trait MealRecordRepository: Send + Sync {
    /// Insert a PENDING record while holding the student's row lock.
    /// `AlreadyServedToday` if a served record completed within `today`.
    async fn create_pending(&self, record: &MealRecord, today: Window)
    -> Result<(), DiningError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MealRecord>, DiningError>;

    /// Finalize a PENDING record in one transaction.
    ///
    /// Approve locks the student row, re-checks `today`, flips the status and
    /// debits the referenced entitlement; a failed debit rolls everything back
    /// with `EntitlementExhausted`. Deny flips the status only.
    async fn finalize(
        &self,
        id: Uuid,
        decision: &Decision,
        approver: Uuid,
        now: DateTime<Utc>,
        today: Window,
    ) -> Result<MealRecord, DiningError>;

    /// APPROVED -> COMPLETED. `completedAt` keeps the approval time.
    async fn complete(&self, id: Uuid) -> Result<MealRecord, DiningError>;

    async fn list(
        &self,
        query: &MealQuery,
        order: SortOrder,
        page: Option<Page>,
    ) -> Result<Vec<MealRecordView>, DiningError>;

    async fn count(&self, query: &MealQuery) -> Result<u64, DiningError>;
}

/// Port for the external face recognition service. Failures degrade to
/// "no match" and are logged by the implementation.
pub trait FaceRecognitionPort: Send + Sync {
    /// Face signatures recognized in a JPEG frame.
    async fn detect(&self, frame: Bytes) -> Vec<String>;

    /// Register a face image (base64) for a principal and return its signature.
    async fn enroll(&self, principal_id: Uuid, image_base64: &str) -> Option<String>;
}
