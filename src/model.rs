use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Cursor;
use tch::{kind::Kind, CModule, Device, Tensor};

use crate::features::NUMERIC_FEATURES;
use crate::types::{FeatureRow, PredictedRow};

/// A pre-trained regression model: one row in, the same row plus a
/// scalar `prediction_label` out.
pub trait Regressor: Send + Sync {
    fn predict(&self, row: &FeatureRow) -> Result<PredictedRow>;
}

#[derive(Deserialize, Debug)]
pub struct MetaJson {
    pub feat_list: Vec<String>,
    pub in_dim: Option<usize>,
}

impl MetaJson {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).with_context(|| "failed to parse model meta.json")
    }
}

/// Map the flat feature map onto the model's input order. One-hot
/// columns the row doesn't carry are 0.0; any other unknown name means
/// the model expects a column we don't produce.
pub fn order_from_flat(map: &HashMap<String, f32>, feat_list: &[String]) -> Result<Vec<f32>> {
    let mut v = Vec::with_capacity(feat_list.len());
    for k in feat_list {
        match map.get(k) {
            Some(x) => v.push(*x),
            None if k.starts_with("sex_") || k.starts_with("category_") => v.push(0.0),
            None if NUMERIC_FEATURES.contains(&k.as_str()) => {
                bail!("feature {} missing from input row", k)
            }
            None => bail!("model expects unknown feature column {}", k),
        }
    }
    Ok(v)
}

/// TorchScript regression model exported with a `meta.json` describing its
/// input columns.
pub struct TorchRegressor {
    model: CModule,
    device: Device,
    feat_list: Vec<String>,
}

impl TorchRegressor {
    pub fn from_bytes(model_bytes: &[u8], meta: MetaJson) -> Result<Self> {
        let device = Device::Cpu;

        if let Some(in_dim) = meta.in_dim {
            if in_dim != meta.feat_list.len() {
                tracing::warn!(
                    "meta.in_dim ({}) != feat_list.len() ({}); using feat_list.len()",
                    in_dim,
                    meta.feat_list.len()
                );
            }
        }

        let model = CModule::load_data_on_device(&mut Cursor::new(model_bytes), device)
            .with_context(|| "failed to load TorchScript model")?;

        let this = Self {
            model,
            device,
            feat_list: meta.feat_list,
        };

        // Dummy forward to check the output shape; expect a single scalar.
        let dummy = vec![0.0f32; this.feat_list.len()];
        this.forward(&dummy).with_context(|| "warmup forward failed")?;
        tracing::info!("loaded model; feat_list[{}]: {:?}", this.feat_list.len(), &this.feat_list);

        Ok(this)
    }

    fn forward(&self, x: &[f32]) -> Result<f64> {
        let in_dim = self.feat_list.len();
        if x.len() != in_dim {
            bail!("feature length mismatch: got {}, expected {}", x.len(), in_dim);
        }

        let input = Tensor::from_slice(x)
            .reshape([1, in_dim as i64])
            .to_device(self.device);

        let out = tch::no_grad(|| self.model.forward_ts(&[input]))?;
        if out.numel() != 1 {
            bail!("unexpected model output size: {:?}", out.size());
        }
        Ok(out.to_kind(Kind::Double).reshape([1]).double_value(&[0]))
    }
}

impl Regressor for TorchRegressor {
    fn predict(&self, row: &FeatureRow) -> Result<PredictedRow> {
        let vec = order_from_flat(&row.to_flat(), &self.feat_list)?;

        if std::env::var("LOG_PRED").ok().as_deref() == Some("1") {
            let sample: Vec<String> = self
                .feat_list
                .iter()
                .zip(&vec)
                .filter(|(_, v)| **v != 0.0)
                .map(|(name, v)| format!("{}={:.3}", name, v))
                .collect();
            tracing::info!("predict in_dim={} nonzero=[{}]", vec.len(), sample.join(", "));
        }

        let label = self.forward(&vec)?;
        Ok(PredictedRow {
            row: row.clone(),
            prediction_label: label,
        })
    }
}
