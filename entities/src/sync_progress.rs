use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Singleton row holding the sync cursor between runs.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_progress")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub cursor_index: i64,
    pub cursor_id: Option<i64>,
    pub ceiling_id: Option<i64>,
    pub head_cursor_id: Option<i64>,
    pub head_top_id: Option<i64>,
    pub total_count: i64,
    pub last_run_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Primary key of the only row in the table.
pub const SINGLETON_ID: i32 = 1;
