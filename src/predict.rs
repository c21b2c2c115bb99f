use crate::error::PipelineError;
use crate::model::Regressor;
use crate::types::{FeatureRow, Prediction};

/// "H:MM:SS" with unpadded hours.
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{}:{:02}:{:02}", h, m, s)
}

/// Run the model on one row and turn its label into a [`Prediction`].
/// The label is seconds, truncated toward zero.
pub fn predict<R: Regressor + ?Sized>(model: &R, row: &FeatureRow) -> Result<Prediction, PipelineError> {
    let out = model
        .predict(row)
        .map_err(|e| PipelineError::Prediction(format!("{:#}", e)))?;

    let label = out.prediction_label;
    if !label.is_finite() || label < 0.0 {
        return Err(PipelineError::Prediction(format!(
            "model returned an invalid duration: {}",
            label
        )));
    }

    let seconds = label.trunc() as u64;
    Ok(Prediction {
        seconds,
        formatted: format_duration(seconds),
    })
}
