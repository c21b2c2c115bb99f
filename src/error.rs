use std::fmt;

use crate::types::Category;

/// Fields the extractor may fail to determine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Sex,
    Age,
    FiveKmTime,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Sex => "sex (male/female)",
            Field::Age => "age",
            Field::FiveKmTime => "5 km time",
        })
    }
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Please describe yourself before running the prediction.")]
    EmptyInput,

    #[error("The text analysis service is unavailable: {0}")]
    ExtractionService(String),

    #[error("Could not parse the AI response ({0}). Try again or rephrase your description.")]
    ExtractionParse(String),

    #[error("Missing information: {}. Please complete your description.", join_fields(.0))]
    MissingFields(Vec<Field>),

    #[error("Age {0} is outside the supported categories (21-90 years).")]
    UnsupportedAge(u32),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Reference data is unavailable: {0}")]
    ReferenceData(String),

    #[error("No comparison data for category {category}.")]
    NoComparisonData { category: Category },
}

impl PipelineError {
    /// Only a missing comparison group degrades the response instead of failing it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::NoComparisonData { .. })
    }

    /// HTTP status for the handler: caller input problems, upstream
    /// collaborators, or our own model.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::EmptyInput
            | PipelineError::ExtractionParse(_)
            | PipelineError::MissingFields(_)
            | PipelineError::UnsupportedAge(_) => 422,
            PipelineError::ExtractionService(_) | PipelineError::ReferenceData(_) => 502,
            PipelineError::Prediction(_) => 500,
            PipelineError::NoComparisonData { .. } => 200,
        }
    }
}
