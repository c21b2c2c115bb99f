//! One user submission, end to end.
//!
//! Stages run strictly in order:
//! `Idle → Extracting → Validating → Categorizing → FeatureBuilding →
//! Predicting → Comparing → Done`. The first fatal error stops the run and
//! is reported together with the stage it happened in. A missing
//! comparison group only drops the chart.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chart::{self, Comparison};
use crate::error::PipelineError;
use crate::extract::{CompletionService, Extractor};
use crate::model::Regressor;
use crate::predict;
use crate::reference::ReferenceCache;
use crate::types::{Confirmation, FeatureRow, Prediction, ValidatedAttributes};
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Idle,
    Extracting,
    Validating,
    Categorizing,
    FeatureBuilding,
    Predicting,
    Comparing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Failure {
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub confirmation: Confirmation,
    pub attributes: ValidatedAttributes,
    pub features: FeatureRow,
    pub prediction: Prediction,
    pub comparison: Option<Comparison>,
    /// Set when the comparison was skipped.
    pub notice: Option<String>,
}

struct Run {
    stage: Stage,
}

impl Run {
    fn enter(&mut self, next: Stage) {
        debug!("pipeline {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&self, error: PipelineError) -> Failure {
        Failure {
            stage: self.stage,
            error,
        }
    }
}

pub struct Pipeline<C, R: ?Sized> {
    extractor: Extractor<C>,
    model: Arc<R>,
    reference: Arc<ReferenceCache>,
}

impl<C, R> Pipeline<C, R>
where
    C: CompletionService,
    R: Regressor + ?Sized,
{
    pub fn new(service: C, model: Arc<R>, reference: Arc<ReferenceCache>) -> Self {
        Self {
            extractor: Extractor::new(service),
            model,
            reference,
        }
    }

    pub async fn run(&self, text: &str) -> Result<Report, Failure> {
        let mut run = Run { stage: Stage::Idle };

        if text.trim().is_empty() {
            return Err(run.fail(PipelineError::EmptyInput));
        }

        run.enter(Stage::Extracting);
        let raw = self.extractor.extract(text).await.map_err(|e| run.fail(e))?;

        run.enter(Stage::Validating);
        let validated = validate::validate(&raw);
        run.enter(Stage::Categorizing);
        let attributes = validated.map_err(|e| {
            // Missing fields are a validation failure; only an age
            // outside the table fails categorization.
            let stage = match e {
                PipelineError::UnsupportedAge(_) => Stage::Categorizing,
                _ => Stage::Validating,
            };
            Failure { stage, error: e }
        })?;

        run.enter(Stage::FeatureBuilding);
        let features = FeatureRow::from_attributes(&attributes);

        run.enter(Stage::Predicting);
        let prediction = predict::predict(self.model.as_ref(), &features).map_err(|e| run.fail(e))?;
        info!(
            "predicted {} ({}s) for category {}",
            prediction.formatted, prediction.seconds, attributes.category
        );

        run.enter(Stage::Comparing);
        let dataset = self
            .reference
            .get()
            .await
            .map_err(|e| run.fail(PipelineError::ReferenceData(format!("{:#}", e))))?;
        let (comparison, notice) =
            match chart::compare(&dataset, attributes.sex, &attributes.category, &prediction) {
                Ok(c) => {
                    info!("compared against {} runners in {}", c.runners, c.category);
                    (Some(c), None)
                }
                Err(e) if !e.is_fatal() => {
                    warn!("{}", e);
                    (None, Some(e.to_string()))
                }
                Err(e) => return Err(run.fail(e)),
            };

        run.enter(Stage::Done);
        Ok(Report {
            confirmation: Confirmation::from_attributes(&attributes),
            attributes,
            features,
            prediction,
            comparison,
            notice,
        })
    }
}
