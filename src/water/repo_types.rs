use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One logged drink. `date` is `dd.mm.yyyy`, `time` is `HH:MM`, both stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct WaterEntry {
    pub id: Uuid,
    pub value: i64,
    pub date: String,
    pub time: String,
    pub owner: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewWaterEntry {
    pub owner: Uuid,
    pub value: i64,
    pub date: String,
    pub time: String,
}

/// Fields to overwrite on an entry. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterChanges {
    pub value: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
}
