use super::context::Value;
use serde::{Deserialize, Serialize};

/// Charge states written to the `status` field of a model.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Succeeded,
    Pending,
    Failed,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Succeeded => "succeeded",
            ChargeStatus::Pending => "pending",
            ChargeStatus::Failed => "failed",
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "succeeded" => Some(ChargeStatus::Succeeded),
            "pending" => Some(ChargeStatus::Pending),
            "failed" => Some(ChargeStatus::Failed),
            _ => None,
        }
    }
}

impl From<ChargeStatus> for Value {
    fn from(status: ChargeStatus) -> Self {
        Value::String(status.as_str().to_string())
    }
}
