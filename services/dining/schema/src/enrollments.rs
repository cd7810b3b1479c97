use sea_orm::entity::prelude::*;

/// A student's subscription to a meal plan.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub student_id: Uuid,
    pub meal_plan_id: Uuid,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,
    pub meals_remaining: i32,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::principals::Entity",
        from = "Column::StudentId",
        to = "super::principals::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::meal_plans::Entity",
        from = "Column::MealPlanId",
        to = "super::meal_plans::Column::Id",
        on_delete = "Restrict"
    )]
    MealPlan,
}

impl Related<super::principals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::meal_plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MealPlan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
