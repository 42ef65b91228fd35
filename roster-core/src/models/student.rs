use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i32,
    pub name: String,
    pub age: i32,
}

/// Request body for create and update. Fields stay optional: the store's
/// NOT NULL constraints are the only validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentInput {
    pub name: Option<String>,
    pub age: Option<i32>,
}
