use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::water::repo_types::WaterEntry;

/// Body of add and update. `value` stays loose so bad numbers get a readable message.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaterPayload {
    pub value: Option<Value>,
    pub date: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodQuery {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonthQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodResponse {
    pub period_data: Vec<WaterEntry>,
    pub total_value: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub deleted_data: WaterEntry,
    pub message: &'static str,
}
