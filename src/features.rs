use std::collections::HashMap;

use crate::types::{FeatureRow, ValidatedAttributes};

/// Assumed average pacing variability; we have no per-runner estimate.
pub const PACE_STABILITY: f64 = 0.0415;

pub const NUMERIC_FEATURES: [&str; 4] = [
    "five_km_seconds",
    "pace_min_per_km",
    "pace_stability",
    "pace",
];

/// Minutes per kilometre over a 5 km effort.
pub fn pace_min_per_km(five_km_seconds: u32) -> f64 {
    (five_km_seconds as f64 / 60.0) / 5.0
}

impl FeatureRow {
    pub fn from_attributes(attrs: &ValidatedAttributes) -> Self {
        let pace = pace_min_per_km(attrs.five_km_seconds);
        Self {
            sex: attrs.sex,
            category: attrs.category.clone(),
            five_km_seconds: attrs.five_km_seconds,
            pace_min_per_km: pace,
            pace_stability: PACE_STABILITY,
            pace,
        }
    }

    pub fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "five_km_seconds" => Some(self.five_km_seconds as f64),
            "pace_min_per_km" => Some(self.pace_min_per_km),
            "pace_stability" => Some(self.pace_stability),
            "pace" => Some(self.pace),
            _ => None,
        }
    }

    /// Flat name → value map: numeric columns plus one-hot `sex_*` and
    /// `category_*` columns for the values this row carries.
    pub fn to_flat(&self) -> HashMap<String, f32> {
        let mut m: HashMap<String, f32> = NUMERIC_FEATURES
            .iter()
            .filter_map(|k| self.numeric(k).map(|v| (k.to_string(), v as f32)))
            .collect();
        m.insert(format!("sex_{}", self.sex.code()), 1.0);
        m.insert(format!("category_{}", self.category), 1.0);
        m
    }
}
