use sea_orm::entity::prelude::*;

/// Student-only attributes, keyed by the owning principal.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "student_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub principal_id: Uuid,
    #[sea_orm(unique)]
    pub student_id: String,
    pub department: Option<String>,
    /// `data:<mime>;base64,...`
    #[sea_orm(column_type = "Text", nullable)]
    pub photo: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub id_card: Option<String>,
    #[sea_orm(unique, nullable)]
    pub face_id: Option<String>,
    #[sea_orm(unique, nullable)]
    pub id_card_number: Option<String>,
    #[sea_orm(indexed, nullable)]
    pub pin: Option<String>,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::principals::Entity",
        from = "Column::PrincipalId",
        to = "super::principals::Column::Id",
        on_delete = "Cascade"
    )]
    Principal,
}

impl Related<super::principals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Principal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
