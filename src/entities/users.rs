use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub nickname: String,

    /// Identity matching key, set once at account creation.
    #[sea_orm(unique)]
    pub email: String,

    pub about_me: Option<String>,

    /// RFC 3339 timestamp of the last authenticated request.
    pub last_seen: Option<String>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
