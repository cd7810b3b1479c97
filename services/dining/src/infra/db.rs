use std::collections::HashMap;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Schema, SqlErr, TransactionError, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use canteen_dining_schema::{
    enrollments, meal_plans, meal_records, principals, student_profiles, tokens,
};
use canteen_domain::calendar::Window;
use canteen_domain::meal::MealStatus;
use canteen_domain::pagination::Page;
use canteen_domain::role::Role;
use canteen_domain::token::TokenStatus;

use crate::domain::repository::{
    EntitlementRepository, MealPlanRepository, MealRecordRepository, PrincipalRepository,
};
use crate::domain::types::{
    CredentialChanges, Decision, Enrollment, EnrollmentView, Entitlement, EntitlementRef,
    MealPlan, MealPlanWithCount, MealQuery, MealRecord, MealRecordView, Principal,
    PrincipalChanges, PrincipalKind, SortOrder, StudentProfile, StudentSummary, Token,
};
use crate::error::DiningError;

// ── Schema bootstrap ─────────────────────────────────────────────────────────

/// Create tables and indexes from the entity definitions if they are absent.
/// Tables are created parents first so foreign keys resolve.
pub async fn ensure_tables(db: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(principals::Entity),
        schema.create_table_from_entity(meal_plans::Entity),
        schema.create_table_from_entity(student_profiles::Entity),
        schema.create_table_from_entity(tokens::Entity),
        schema.create_table_from_entity(enrollments::Entity),
        schema.create_table_from_entity(meal_records::Entity),
    ];
    for mut table in tables {
        table.if_not_exists();
        db.execute(backend.build(&table))
            .await
            .context("create table")?;
    }

    let indexes = [
        schema.create_index_from_entity(student_profiles::Entity),
        schema.create_index_from_entity(tokens::Entity),
        schema.create_index_from_entity(enrollments::Entity),
        schema.create_index_from_entity(meal_records::Entity),
    ];
    for mut index in indexes.into_iter().flatten() {
        index.if_not_exists();
        db.execute(backend.build(&index))
            .await
            .context("create index")?;
    }
    Ok(())
}

// ── Error mapping ────────────────────────────────────────────────────────────

/// Map a unique-constraint name to the conflict it represents.
fn conflict_for(constraint: &str) -> Option<DiningError> {
    if constraint.contains("id_card_number") {
        Some(DiningError::IdCardTaken)
    } else if constraint.contains("face_id") {
        Some(DiningError::FaceIdTaken)
    } else if constraint.contains("student_id") {
        Some(DiningError::StudentIdTaken)
    } else if constraint.contains("email") {
        Some(DiningError::EmailTaken)
    } else {
        None
    }
}

fn db_error(err: DbErr, context: &'static str) -> DiningError {
    if let Some(SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
        if let Some(conflict) = conflict_for(&msg) {
            return conflict;
        }
    }
    DiningError::Internal(anyhow::Error::new(err).context(context))
}

fn txn_error(err: TransactionError<DbErr>, context: &'static str) -> DiningError {
    match err {
        TransactionError::Connection(e) | TransactionError::Transaction(e) => db_error(e, context),
    }
}

// ── Model conversions ────────────────────────────────────────────────────────

fn profile_from_model(model: student_profiles::Model) -> StudentProfile {
    StudentProfile {
        student_id: model.student_id,
        department: model.department,
        photo: model.photo,
        id_card: model.id_card,
        face_id: model.face_id,
        id_card_number: model.id_card_number,
        pin: model.pin,
        enrolled_at: model.enrolled_at,
    }
}

fn principal_from_models(
    model: principals::Model,
    profile: Option<student_profiles::Model>,
) -> Result<Principal, DiningError> {
    let role = u8::try_from(model.role)
        .ok()
        .and_then(Role::from_u8)
        .ok_or_else(|| anyhow::anyhow!("principal {} has unknown role {}", model.id, model.role))?;
    let kind = match role {
        Role::Admin => PrincipalKind::Admin,
        Role::Manager => PrincipalKind::Manager,
        Role::Student => {
            let profile = profile
                .ok_or_else(|| anyhow::anyhow!("student {} has no profile", model.id))?;
            PrincipalKind::Student(profile_from_model(profile))
        }
    };
    Ok(Principal {
        id: model.id,
        email: model.email,
        name: model.name,
        password_hash: model.password_hash,
        kind,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn token_from_model(model: tokens::Model) -> Result<Token, DiningError> {
    let status = model
        .status
        .parse::<TokenStatus>()
        .with_context(|| format!("token {}", model.id))?;
    Ok(Token {
        id: model.id,
        student_id: model.student_id,
        token_number: model.token_number,
        status,
        purchased_at: model.purchased_at,
        expires_at: model.expires_at,
    })
}

fn plan_from_model(model: meal_plans::Model) -> MealPlan {
    MealPlan {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        meal_count: model.meal_count,
        duration_days: model.duration_days,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn enrollment_from_model(model: enrollments::Model) -> Enrollment {
    Enrollment {
        id: model.id,
        student_id: model.student_id,
        meal_plan_id: model.meal_plan_id,
        start_date: model.start_date,
        end_date: model.end_date,
        meals_remaining: model.meals_remaining,
        is_active: model.is_active,
        created_at: model.created_at,
    }
}

fn record_from_model(model: meal_records::Model) -> Result<MealRecord, DiningError> {
    let status = model
        .status
        .parse::<MealStatus>()
        .with_context(|| format!("meal record {}", model.id))?;
    let verification_method = model
        .verification_method
        .parse()
        .with_context(|| format!("meal record {}", model.id))?;
    let entitlement = match (model.token_id, model.enrollment_id) {
        (Some(id), _) => Some(EntitlementRef::Token(id)),
        (None, Some(id)) => Some(EntitlementRef::Enrollment(id)),
        (None, None) => None,
    };
    Ok(MealRecord {
        id: model.id,
        student_id: model.student_id,
        entitlement,
        status,
        verification_method,
        requested_at: model.requested_at,
        approved_at: model.approved_at,
        completed_at: model.completed_at,
        denied_reason: model.denied_reason,
        approved_by: model.approved_by,
    })
}

async fn load_summaries<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, StudentSummary>, DiningError> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = principals::Entity::find()
        .filter(principals::Column::Id.is_in(ids))
        .find_also_related(student_profiles::Entity)
        .all(db)
        .await
        .context("load student summaries")?;
    Ok(rows
        .into_iter()
        .map(|(p, profile)| {
            let summary = StudentSummary {
                id: p.id,
                name: p.name,
                student_id: profile.map(|s| s.student_id),
                email: p.email,
            };
            (summary.id, summary)
        })
        .collect())
}

/// Summary for a principal that no longer exists.
fn missing_summary(id: Uuid) -> StudentSummary {
    StudentSummary {
        id,
        name: String::new(),
        student_id: None,
        email: String::new(),
    }
}

/// Lock the principal row for the rest of the transaction. Serializes every
/// served-today check and entitlement debit for one student.
async fn lock_student(txn: &DatabaseTransaction, student_id: Uuid) -> Result<(), DiningError> {
    principals::Entity::find_by_id(student_id)
        .lock_exclusive()
        .one(txn)
        .await
        .context("lock student row")?
        .ok_or(DiningError::StudentNotFound)?;
    Ok(())
}

async fn served_within<C: ConnectionTrait>(
    db: &C,
    student_id: Uuid,
    window: Window,
) -> Result<bool, DiningError> {
    let served = meal_records::Entity::find()
        .filter(meal_condition(&MealQuery {
            student_id: Some(student_id),
            completed_in: Some(window),
            ..MealQuery::served()
        }))
        .count(db)
        .await
        .context("count served meals")?;
    Ok(served > 0)
}

fn meal_condition(query: &MealQuery) -> Condition {
    let mut cond = Condition::all();
    if !query.statuses.is_empty() {
        cond = cond.add(
            meal_records::Column::Status.is_in(query.statuses.iter().map(|s| s.as_str())),
        );
    }
    if let Some(student_id) = query.student_id {
        cond = cond.add(meal_records::Column::StudentId.eq(student_id));
    }
    for (column, window) in [
        (meal_records::Column::RequestedAt, query.requested_in),
        (meal_records::Column::ApprovedAt, query.approved_in),
        (meal_records::Column::CompletedAt, query.completed_in),
    ] {
        if let Some(window) = window {
            cond = cond.add(column.gte(window.start)).add(column.lt(window.end));
        }
    }
    cond
}

// ── Principal repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPrincipalRepository {
    pub db: DatabaseConnection,
}

impl DbPrincipalRepository {
    async fn find_student(&self, cond: Condition) -> Result<Option<Principal>, DiningError> {
        let row = student_profiles::Entity::find()
            .filter(cond)
            .order_by_asc(student_profiles::Column::EnrolledAt)
            .order_by_asc(student_profiles::Column::PrincipalId)
            .find_also_related(principals::Entity)
            .one(&self.db)
            .await
            .context("find student")?;
        match row {
            Some((profile, Some(principal))) => principal_from_models(principal, Some(profile)).map(Some),
            _ => Ok(None),
        }
    }
}

impl PrincipalRepository for DbPrincipalRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, DiningError> {
        let row = principals::Entity::find_by_id(id)
            .find_also_related(student_profiles::Entity)
            .one(&self.db)
            .await
            .context("find principal by id")?;
        row.map(|(p, profile)| principal_from_models(p, profile))
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DiningError> {
        let row = principals::Entity::find()
            .filter(principals::Column::Email.eq(email))
            .find_also_related(student_profiles::Entity)
            .one(&self.db)
            .await
            .context("find principal by email")?;
        row.map(|(p, profile)| principal_from_models(p, profile))
            .transpose()
    }

    async fn find_student_by_student_id(
        &self,
        student_id: &str,
    ) -> Result<Option<Principal>, DiningError> {
        self.find_student(Condition::all().add(student_profiles::Column::StudentId.eq(student_id)))
            .await
    }

    async fn find_student_by_face_id(
        &self,
        face_id: &str,
    ) -> Result<Option<Principal>, DiningError> {
        self.find_student(Condition::all().add(student_profiles::Column::FaceId.eq(face_id)))
            .await
    }

    async fn find_student_by_id_card(
        &self,
        id_card_number: &str,
    ) -> Result<Option<Principal>, DiningError> {
        self.find_student(
            Condition::all().add(student_profiles::Column::IdCardNumber.eq(id_card_number)),
        )
        .await
    }

    async fn find_student_by_pin(&self, pin: &str) -> Result<Option<Principal>, DiningError> {
        self.find_student(Condition::all().add(student_profiles::Column::Pin.eq(pin)))
            .await
    }

    async fn create(&self, principal: &Principal) -> Result<(), DiningError> {
        let principal = principal.clone();
        self.db
            .transaction::<_, (), DbErr>(|txn| {
                Box::pin(async move {
                    principals::ActiveModel {
                        id: Set(principal.id),
                        email: Set(principal.email.clone()),
                        name: Set(principal.name.clone()),
                        password_hash: Set(principal.password_hash.clone()),
                        role: Set(principal.role().as_u8().into()),
                        created_at: Set(principal.created_at),
                        updated_at: Set(principal.updated_at),
                    }
                    .insert(txn)
                    .await?;

                    if let PrincipalKind::Student(profile) = &principal.kind {
                        student_profiles::ActiveModel {
                            principal_id: Set(principal.id),
                            student_id: Set(profile.student_id.clone()),
                            department: Set(profile.department.clone()),
                            photo: Set(profile.photo.clone()),
                            id_card: Set(profile.id_card.clone()),
                            face_id: Set(profile.face_id.clone()),
                            id_card_number: Set(profile.id_card_number.clone()),
                            pin: Set(profile.pin.clone()),
                            enrolled_at: Set(profile.enrolled_at),
                        }
                        .insert(txn)
                        .await?;
                    }
                    Ok(())
                })
            })
            .await
            .map_err(|e| txn_error(e, "create principal"))
    }

    async fn list(&self) -> Result<Vec<Principal>, DiningError> {
        let rows = principals::Entity::find()
            .find_also_related(student_profiles::Entity)
            .order_by_desc(principals::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list principals")?;
        rows.into_iter()
            .map(|(p, profile)| principal_from_models(p, profile))
            .collect()
    }

    async fn list_students_with_photo(&self) -> Result<Vec<Principal>, DiningError> {
        let rows = student_profiles::Entity::find()
            .filter(student_profiles::Column::Photo.is_not_null())
            .order_by_asc(student_profiles::Column::EnrolledAt)
            .find_also_related(principals::Entity)
            .all(&self.db)
            .await
            .context("list students with photo")?;
        rows.into_iter()
            .filter_map(|(profile, p)| p.map(|p| principal_from_models(p, Some(profile))))
            .collect()
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &PrincipalChanges,
    ) -> Result<Option<Principal>, DiningError> {
        let txn = self.db.begin().await.context("begin principal update")?;
        let Some(model) = principals::Entity::find_by_id(id)
            .one(&txn)
            .await
            .context("find principal for update")?
        else {
            return Ok(None);
        };

        let mut active: principals::ActiveModel = model.into();
        if let Some(name) = &changes.name {
            active.name = Set(name.clone());
        }
        if let Some(email) = &changes.email {
            active.email = Set(email.clone());
        }
        if let Some(hash) = &changes.password_hash {
            active.password_hash = Set(hash.clone());
        }
        active.updated_at = Set(Utc::now());
        active
            .update(&txn)
            .await
            .map_err(|e| db_error(e, "update principal"))?;

        let touches_profile = changes.department.is_some()
            || changes.student_id.is_some()
            || changes.id_card_number.is_some();
        if touches_profile {
            if let Some(profile) = student_profiles::Entity::find_by_id(id)
                .one(&txn)
                .await
                .context("find profile for update")?
            {
                let mut active: student_profiles::ActiveModel = profile.into();
                if let Some(department) = &changes.department {
                    active.department = Set(Some(department.clone()));
                }
                if let Some(student_id) = &changes.student_id {
                    active.student_id = Set(student_id.clone());
                }
                if let Some(card) = &changes.id_card_number {
                    active.id_card_number = Set(card.clone());
                }
                active
                    .update(&txn)
                    .await
                    .map_err(|e| db_error(e, "update student profile"))?;
            }
        }
        txn.commit().await.context("commit principal update")?;
        self.find_by_id(id).await
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        changes: &CredentialChanges,
    ) -> Result<Option<Principal>, DiningError> {
        let Some(profile) = student_profiles::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find profile for credential update")?
        else {
            return Ok(None);
        };

        let mut active: student_profiles::ActiveModel = profile.into();
        if let Some(card) = &changes.id_card_number {
            active.id_card_number = Set(Some(card.clone()));
        }
        if let Some(pin) = &changes.pin {
            active.pin = Set(Some(pin.clone()));
        }
        if let Some(face_id) = &changes.face_id {
            active.face_id = Set(Some(face_id.clone()));
        }
        if active.is_changed() {
            active
                .update(&self.db)
                .await
                .map_err(|e| db_error(e, "update student credentials"))?;
        }
        self.find_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DiningError> {
        let result = principals::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .context("delete principal")?;
        Ok(result.rows_affected > 0)
    }

    async fn count_by_role(&self, role: Role) -> Result<u64, DiningError> {
        let count = principals::Entity::find()
            .filter(principals::Column::Role.eq(i16::from(role.as_u8())))
            .count(&self.db)
            .await
            .context("count principals by role")?;
        Ok(count)
    }
}

// ── Entitlement repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEntitlementRepository {
    pub db: DatabaseConnection,
}

impl EntitlementRepository for DbEntitlementRepository {
    async fn find_entitlement(
        &self,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, DiningError> {
        let token = tokens::Entity::find()
            .filter(tokens::Column::StudentId.eq(student_id))
            .filter(tokens::Column::Status.eq(TokenStatus::Active.as_str()))
            .filter(
                Condition::any()
                    .add(tokens::Column::ExpiresAt.is_null())
                    .add(tokens::Column::ExpiresAt.gt(now)),
            )
            .order_by_asc(tokens::Column::PurchasedAt)
            .one(&self.db)
            .await
            .context("find usable token")?;
        if let Some(token) = token {
            return Ok(Some(Entitlement::Token(token_from_model(token)?)));
        }

        let enrollment = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id))
            .filter(enrollments::Column::IsActive.eq(true))
            .filter(enrollments::Column::MealsRemaining.gt(0))
            .order_by_asc(enrollments::Column::CreatedAt)
            .find_also_related(meal_plans::Entity)
            .one(&self.db)
            .await
            .context("find usable enrollment")?;
        Ok(match enrollment {
            Some((enrollment, Some(plan))) => Some(Entitlement::Enrollment(
                enrollment_from_model(enrollment),
                plan_from_model(plan),
            )),
            _ => None,
        })
    }

    async fn list_tokens(&self, student_id: Uuid) -> Result<Vec<Token>, DiningError> {
        let models = tokens::Entity::find()
            .filter(tokens::Column::StudentId.eq(student_id))
            .order_by_desc(tokens::Column::PurchasedAt)
            .all(&self.db)
            .await
            .context("list tokens")?;
        models.into_iter().map(token_from_model).collect()
    }

    async fn count_active_tokens(&self, student_id: Option<Uuid>) -> Result<u64, DiningError> {
        let mut select =
            tokens::Entity::find().filter(tokens::Column::Status.eq(TokenStatus::Active.as_str()));
        if let Some(student_id) = student_id {
            select = select.filter(tokens::Column::StudentId.eq(student_id));
        }
        let count = select
            .count(&self.db)
            .await
            .context("count active tokens")?;
        Ok(count)
    }

    async fn create_enrollment(&self, enrollment: &Enrollment) -> Result<(), DiningError> {
        let txn = self.db.begin().await.context("begin enrollment")?;
        lock_student(&txn, enrollment.student_id).await?;

        let active = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(enrollment.student_id))
            .filter(enrollments::Column::IsActive.eq(true))
            .count(&txn)
            .await
            .context("count active enrollments")?;
        if active > 0 {
            return Err(DiningError::ActiveEnrollmentExists);
        }

        enrollments::ActiveModel {
            id: Set(enrollment.id),
            student_id: Set(enrollment.student_id),
            meal_plan_id: Set(enrollment.meal_plan_id),
            start_date: Set(enrollment.start_date),
            end_date: Set(enrollment.end_date),
            meals_remaining: Set(enrollment.meals_remaining),
            is_active: Set(enrollment.is_active),
            created_at: Set(enrollment.created_at),
        }
        .insert(&txn)
        .await
        .context("insert enrollment")?;
        txn.commit().await.context("commit enrollment")?;
        Ok(())
    }

    async fn list_enrollments(&self) -> Result<Vec<EnrollmentView>, DiningError> {
        let rows = enrollments::Entity::find()
            .find_also_related(meal_plans::Entity)
            .order_by_desc(enrollments::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list enrollments")?;
        let students = load_summaries(&self.db, rows.iter().map(|(e, _)| e.student_id)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(enrollment, plan)| {
                let plan = plan_from_model(plan?);
                let student = students
                    .get(&enrollment.student_id)
                    .cloned()
                    .unwrap_or_else(|| missing_summary(enrollment.student_id));
                Some(EnrollmentView {
                    enrollment: enrollment_from_model(enrollment),
                    student,
                    plan,
                })
            })
            .collect())
    }

    async fn list_student_enrollments(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<(Enrollment, MealPlan)>, DiningError> {
        let rows = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id))
            .find_also_related(meal_plans::Entity)
            .order_by_desc(enrollments::Column::StartDate)
            .all(&self.db)
            .await
            .context("list student enrollments")?;
        Ok(rows
            .into_iter()
            .filter_map(|(e, plan)| Some((enrollment_from_model(e), plan_from_model(plan?))))
            .collect())
    }

    async fn deactivate_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>, DiningError> {
        let result = enrollments::Entity::update_many()
            .col_expr(enrollments::Column::IsActive, Expr::value(false))
            .filter(enrollments::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("deactivate enrollment")?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        let model = enrollments::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("reload enrollment")?;
        Ok(model.map(enrollment_from_model))
    }

    async fn count_usable_enrollments(&self, student_id: Uuid) -> Result<u64, DiningError> {
        let count = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id))
            .filter(enrollments::Column::IsActive.eq(true))
            .filter(enrollments::Column::MealsRemaining.gt(0))
            .count(&self.db)
            .await
            .context("count usable enrollments")?;
        Ok(count)
    }

    async fn count_students_with_active_enrollment(&self) -> Result<u64, DiningError> {
        let count = enrollments::Entity::find()
            .select_only()
            .column(enrollments::Column::StudentId)
            .filter(enrollments::Column::IsActive.eq(true))
            .distinct()
            .count(&self.db)
            .await
            .context("count students with active enrollment")?;
        Ok(count)
    }
}

// ── Meal plan repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbMealPlanRepository {
    pub db: DatabaseConnection,
}

fn plan_active_model(plan: &MealPlan) -> meal_plans::ActiveModel {
    meal_plans::ActiveModel {
        id: Set(plan.id),
        name: Set(plan.name.clone()),
        description: Set(plan.description.clone()),
        price: Set(plan.price),
        meal_count: Set(plan.meal_count),
        duration_days: Set(plan.duration_days),
        is_active: Set(plan.is_active),
        created_at: Set(plan.created_at),
        updated_at: Set(plan.updated_at),
    }
}

impl MealPlanRepository for DbMealPlanRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MealPlan>, DiningError> {
        let model = meal_plans::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find meal plan")?;
        Ok(model.map(plan_from_model))
    }

    async fn list_with_counts(&self) -> Result<Vec<MealPlanWithCount>, DiningError> {
        let plans = meal_plans::Entity::find()
            .order_by_desc(meal_plans::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list meal plans")?;
        let counts: HashMap<Uuid, i64> = enrollments::Entity::find()
            .select_only()
            .column(enrollments::Column::MealPlanId)
            .column_as(Expr::col(enrollments::Column::Id).count(), "count")
            .group_by(enrollments::Column::MealPlanId)
            .into_tuple::<(Uuid, i64)>()
            .all(&self.db)
            .await
            .context("count enrollments per plan")?
            .into_iter()
            .collect();
        Ok(plans
            .into_iter()
            .map(|plan| MealPlanWithCount {
                enrollment_count: counts
                    .get(&plan.id)
                    .copied()
                    .map_or(0, |c| c.max(0).unsigned_abs()),
                plan: plan_from_model(plan),
            })
            .collect())
    }

    async fn create(&self, plan: &MealPlan) -> Result<(), DiningError> {
        plan_active_model(plan)
            .insert(&self.db)
            .await
            .context("create meal plan")?;
        Ok(())
    }

    async fn save(&self, plan: &MealPlan) -> Result<(), DiningError> {
        plan_active_model(plan)
            .update(&self.db)
            .await
            .context("update meal plan")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DiningError> {
        let referenced = enrollments::Entity::find()
            .filter(enrollments::Column::MealPlanId.eq(id))
            .count(&self.db)
            .await
            .context("count plan enrollments")?;
        if referenced > 0 {
            return Err(DiningError::MealPlanInUse);
        }
        let result = meal_plans::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => DiningError::MealPlanInUse,
                _ => db_error(e, "delete meal plan"),
            })?;
        Ok(result.rows_affected > 0)
    }

    async fn count_active(&self) -> Result<u64, DiningError> {
        let count = meal_plans::Entity::find()
            .filter(meal_plans::Column::IsActive.eq(true))
            .count(&self.db)
            .await
            .context("count active meal plans")?;
        Ok(count)
    }
}

// ── Meal record repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbMealRecordRepository {
    pub db: DatabaseConnection,
}

impl DbMealRecordRepository {
    async fn views(&self, records: Vec<MealRecord>) -> Result<Vec<MealRecordView>, DiningError> {
        let students = load_summaries(&self.db, records.iter().map(|r| r.student_id)).await?;

        let token_ids: Vec<Uuid> = records.iter().filter_map(MealRecord::token_id).collect();
        let token_numbers: HashMap<Uuid, String> = if token_ids.is_empty() {
            HashMap::new()
        } else {
            tokens::Entity::find()
                .filter(tokens::Column::Id.is_in(token_ids))
                .all(&self.db)
                .await
                .context("load token numbers")?
                .into_iter()
                .map(|t| (t.id, t.token_number))
                .collect()
        };

        let enrollment_ids: Vec<Uuid> = records
            .iter()
            .filter_map(MealRecord::enrollment_id)
            .collect();
        let plan_names: HashMap<Uuid, String> = if enrollment_ids.is_empty() {
            HashMap::new()
        } else {
            enrollments::Entity::find()
                .filter(enrollments::Column::Id.is_in(enrollment_ids))
                .find_also_related(meal_plans::Entity)
                .all(&self.db)
                .await
                .context("load plan names")?
                .into_iter()
                .filter_map(|(e, plan)| plan.map(|p| (e.id, p.name)))
                .collect()
        };

        Ok(records
            .into_iter()
            .map(|record| MealRecordView {
                student: students
                    .get(&record.student_id)
                    .cloned()
                    .unwrap_or_else(|| missing_summary(record.student_id)),
                token_number: record.token_id().and_then(|id| token_numbers.get(&id).cloned()),
                meal_plan_name: record
                    .enrollment_id()
                    .and_then(|id| plan_names.get(&id).cloned()),
                record,
            })
            .collect())
    }
}

impl MealRecordRepository for DbMealRecordRepository {
    async fn create_pending(&self, record: &MealRecord, today: Window) -> Result<(), DiningError> {
        let txn = self.db.begin().await.context("begin pending record")?;
        lock_student(&txn, record.student_id).await?;
        if served_within(&txn, record.student_id, today).await? {
            return Err(DiningError::AlreadyServedToday);
        }

        meal_records::ActiveModel {
            id: Set(record.id),
            student_id: Set(record.student_id),
            token_id: Set(record.token_id()),
            enrollment_id: Set(record.enrollment_id()),
            status: Set(record.status.as_str().to_owned()),
            verification_method: Set(record.verification_method.as_str().to_owned()),
            requested_at: Set(record.requested_at),
            approved_at: Set(record.approved_at),
            completed_at: Set(record.completed_at),
            denied_reason: Set(record.denied_reason.clone()),
            approved_by: Set(record.approved_by),
        }
        .insert(&txn)
        .await
        .context("insert meal record")?;
        txn.commit().await.context("commit pending record")?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MealRecord>, DiningError> {
        let model = meal_records::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find meal record")?;
        model.map(record_from_model).transpose()
    }

    async fn finalize(
        &self,
        id: Uuid,
        decision: &Decision,
        approver: Uuid,
        now: DateTime<Utc>,
        today: Window,
    ) -> Result<MealRecord, DiningError> {
        let txn = self.db.begin().await.context("begin meal decision")?;
        let record = meal_records::Entity::find_by_id(id)
            .one(&txn)
            .await
            .context("find meal record for decision")?
            .map(record_from_model)
            .transpose()?
            .ok_or(DiningError::MealRecordNotFound)?;

        let pending = meal_records::Column::Status.eq(MealStatus::Pending.as_str());
        match decision {
            Decision::Deny { reason } => {
                let flipped = meal_records::Entity::update_many()
                    .col_expr(
                        meal_records::Column::Status,
                        Expr::value(MealStatus::Denied.as_str()),
                    )
                    .col_expr(meal_records::Column::ApprovedAt, Expr::value(now))
                    .col_expr(meal_records::Column::ApprovedBy, Expr::value(approver))
                    .col_expr(meal_records::Column::DeniedReason, Expr::value(reason.clone()))
                    .filter(meal_records::Column::Id.eq(id))
                    .filter(pending)
                    .exec(&txn)
                    .await
                    .context("deny meal record")?;
                if flipped.rows_affected == 0 {
                    return Err(DiningError::AlreadyProcessed);
                }
            }
            Decision::Approve => {
                lock_student(&txn, record.student_id).await?;
                if served_within(&txn, record.student_id, today).await? {
                    return Err(DiningError::AlreadyServedToday);
                }

                let flipped = meal_records::Entity::update_many()
                    .col_expr(
                        meal_records::Column::Status,
                        Expr::value(MealStatus::Approved.as_str()),
                    )
                    .col_expr(meal_records::Column::ApprovedAt, Expr::value(now))
                    .col_expr(meal_records::Column::CompletedAt, Expr::value(now))
                    .col_expr(meal_records::Column::ApprovedBy, Expr::value(approver))
                    .filter(meal_records::Column::Id.eq(id))
                    .filter(pending)
                    .exec(&txn)
                    .await
                    .context("approve meal record")?;
                if flipped.rows_affected == 0 {
                    return Err(DiningError::AlreadyProcessed);
                }

                let debited = match record.entitlement {
                    Some(EntitlementRef::Token(token_id)) => {
                        tokens::Entity::update_many()
                            .col_expr(
                                tokens::Column::Status,
                                Expr::value(TokenStatus::Used.as_str()),
                            )
                            .filter(tokens::Column::Id.eq(token_id))
                            .filter(tokens::Column::Status.eq(TokenStatus::Active.as_str()))
                            .exec(&txn)
                            .await
                            .context("consume token")?
                            .rows_affected
                    }
                    Some(EntitlementRef::Enrollment(enrollment_id)) => {
                        enrollments::Entity::update_many()
                            .col_expr(
                                enrollments::Column::MealsRemaining,
                                Expr::col(enrollments::Column::MealsRemaining).sub(1),
                            )
                            .filter(enrollments::Column::Id.eq(enrollment_id))
                            .filter(enrollments::Column::MealsRemaining.gt(0))
                            .exec(&txn)
                            .await
                            .context("decrement enrollment")?
                            .rows_affected
                    }
                    None => 0,
                };
                // Dropping the transaction rolls the status flip back.
                if debited == 0 {
                    return Err(DiningError::EntitlementExhausted);
                }
            }
        }

        let updated = meal_records::Entity::find_by_id(id)
            .one(&txn)
            .await
            .context("reload meal record")?
            .ok_or(DiningError::MealRecordNotFound)?;
        txn.commit().await.context("commit meal decision")?;
        record_from_model(updated)
    }

    async fn complete(&self, id: Uuid) -> Result<MealRecord, DiningError> {
        let flipped = meal_records::Entity::update_many()
            .col_expr(
                meal_records::Column::Status,
                Expr::value(MealStatus::Completed.as_str()),
            )
            .filter(meal_records::Column::Id.eq(id))
            .filter(meal_records::Column::Status.eq(MealStatus::Approved.as_str()))
            .exec(&self.db)
            .await
            .context("complete meal record")?;
        let record = self.find_by_id(id).await?.ok_or(DiningError::MealRecordNotFound)?;
        if flipped.rows_affected == 0 {
            return Err(DiningError::AlreadyProcessed);
        }
        Ok(record)
    }

    async fn list(
        &self,
        query: &MealQuery,
        order: SortOrder,
        page: Option<Page>,
    ) -> Result<Vec<MealRecordView>, DiningError> {
        let mut select = meal_records::Entity::find().filter(meal_condition(query));
        select = match order {
            SortOrder::OldestFirst => select
                .order_by_asc(meal_records::Column::RequestedAt)
                .order_by_asc(meal_records::Column::Id),
            SortOrder::NewestFirst => select
                .order_by_desc(meal_records::Column::RequestedAt)
                .order_by_desc(meal_records::Column::Id),
        };
        if let Some(page) = page {
            select = select.offset(page.offset).limit(page.limit);
        }
        let records = select
            .all(&self.db)
            .await
            .context("list meal records")?
            .into_iter()
            .map(record_from_model)
            .collect::<Result<Vec<_>, _>>()?;
        self.views(records).await
    }

    async fn count(&self, query: &MealQuery) -> Result<u64, DiningError> {
        let count = meal_records::Entity::find()
            .filter(meal_condition(query))
            .count(&self.db)
            .await
            .context("count meal records")?;
        Ok(count)
    }
}
