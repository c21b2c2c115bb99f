use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// Accepts "M", "F" and the Polish "K" (kobieta), case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "M" => Some(Sex::Male),
            "F" | "K" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Sex + decade bucket, e.g. "M30".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(sex: Sex, decade: &str) -> Self {
        Self(format!("{}{}", sex.code(), decade))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// What the text-understanding service told us; zero is kept so the
// validator can decide what counts as "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawExtraction {
    pub sex: Option<Sex>,
    pub age: Option<u32>,
    pub five_km_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedAttributes {
    pub sex: Sex,
    pub age: u32,
    pub five_km_seconds: u32,
    pub category: Category,
}

/// Single-row model input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub sex: Sex,
    pub category: Category,
    pub five_km_seconds: u32,
    pub pace_min_per_km: f64,
    pub pace_stability: f64,
    pub pace: f64,
}

/// A feature row with the model's scalar output appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictedRow {
    #[serde(flatten)]
    pub row: FeatureRow,
    pub prediction_label: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub seconds: u64,
    pub formatted: String,
}

/// What the user sees first: the attributes as we understood them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub sex: &'static str,
    pub category: Category,
    pub five_km: String,
}

impl Confirmation {
    pub fn from_attributes(attrs: &ValidatedAttributes) -> Self {
        let t = attrs.five_km_seconds;
        Self {
            sex: attrs.sex.label(),
            category: attrs.category.clone(),
            five_km: format!("{}:{:02} ({}s)", t / 60, t % 60, t),
        }
    }
}
