use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// List of labels persisted as a JSON array in a text column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

impl From<Vec<String>> for StringList {
    fn from(v: Vec<String>) -> Self {
        StringList(v)
    }
}
