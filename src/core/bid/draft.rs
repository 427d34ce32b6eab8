use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BidError, BidResult};

/// Kind of bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidType {
    Contract,
    Spot,
    Seasonal,
    Regional,
}

impl BidType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Spot => "spot",
            Self::Seasonal => "seasonal",
            Self::Regional => "regional",
        }
    }
}

impl fmt::Display for BidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bid extracted from a completed `create_bid` call.
///
/// `name`, `bid_type`, `start_date`, `end_date` and `submission_deadline` are
/// mandatory; every other field may be absent. Dates are kept as the ISO
/// strings the model produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub bid_type: BidType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    pub start_date: String,
    pub end_date: String,
    pub submission_deadline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl BidDraft {
    /// Parse the JSON-encoded `arguments` of a function call.
    pub fn from_arguments(arguments: &str) -> BidResult<Self> {
        let draft: BidDraft = serde_json::from_str(arguments)
            .map_err(|e| BidError::InvalidArguments(e.to_string()))?;
        draft.validate()?;
        Ok(draft)
    }

    /// Reject blank mandatory fields and negative budgets.
    pub fn validate(&self) -> BidResult<()> {
        let mandatory = [
            ("name", &self.name),
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("submission_deadline", &self.submission_deadline),
        ];
        for (field, value) in mandatory {
            if value.trim().is_empty() {
                return Err(BidError::MissingField(field));
            }
        }

        if let Some(budget) = self.budget
            && (!budget.is_finite() || budget < 0.0)
        {
            return Err(BidError::InvalidArguments(format!(
                "budget must be a non-negative number, got {budget}"
            )));
        }

        Ok(())
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
