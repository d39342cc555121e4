use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::string_list::StringList;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "games")]
pub struct Model {
    /// Upstream app id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub platforms: StringList,
    pub base_price: Option<f64>,
    pub discount: f64,
    pub rating: f64,
    pub dau: i64,
    #[sea_orm(column_type = "Text")]
    pub tags: StringList,
    #[sea_orm(column_type = "Text")]
    pub cover: String,
    #[sea_orm(column_type = "Text")]
    pub release_date: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Epoch milliseconds of the last successful upsert
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
