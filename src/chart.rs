//! Comparison of a prediction against the runner's age/sex group.

use anyhow::Result;
use plotters::prelude::*;
use serde::Serialize;

use crate::error::PipelineError;
use crate::reference::ReferenceDataset;
use crate::types::{Category, Prediction, Sex};

pub const HISTOGRAM_BINS: usize = 30;

const BAR_COLOR: RGBColor = RGBColor(0x66, 0x7e, 0xea);

/// Equal-width bins over `[min, min + bin_width * counts.len()]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub bin_width: f64,
    pub counts: Vec<u32>,
}

impl Histogram {
    /// `None` for an empty input. The maximum value falls into the last
    /// bin; when every value is equal they all go into the first one.
    pub fn build(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let bin_width = if max > min { (max - min) / bins as f64 } else { 1.0 };

        let mut counts = vec![0u32; bins];
        for v in values {
            let idx = ((v - min) / bin_width).floor() as usize;
            counts[idx.min(bins - 1)] += 1;
        }
        Some(Self { min, bin_width, counts })
    }

    pub fn max(&self) -> f64 {
        self.min + self.bin_width * self.counts.len() as f64
    }

    /// (low edge, high edge, count) per bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, u32)> + '_ {
        self.counts.iter().enumerate().map(move |(i, c)| {
            let lo = self.min + self.bin_width * i as f64;
            (lo, lo + self.bin_width, *c)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub sex: Sex,
    pub category: Category,
    pub runners: usize,
    pub predicted_seconds: u64,
    pub marker_label: String,
    /// Share of the group strictly faster than the prediction.
    pub faster_share: f64,
    pub histogram: Histogram,
    pub svg: Option<String>,
}

pub fn compare(
    dataset: &ReferenceDataset,
    sex: Sex,
    category: &Category,
    prediction: &Prediction,
) -> Result<Comparison, PipelineError> {
    let times = dataset.finish_times(sex, category);
    let no_data = || PipelineError::NoComparisonData {
        category: category.clone(),
    };
    let histogram = Histogram::build(&times, HISTOGRAM_BINS).ok_or_else(no_data)?;

    let predicted = prediction.seconds as f64;
    let faster = times.iter().filter(|t| **t < predicted).count();
    let marker_label = format!("Your predicted time: {}", prediction.formatted);

    let svg = match render_svg(&histogram, predicted, &marker_label, category) {
        Ok(svg) => Some(svg),
        Err(e) => {
            tracing::warn!("chart rendering failed for {}: {:#}", category, e);
            None
        }
    };

    Ok(Comparison {
        sex,
        category: category.clone(),
        runners: times.len(),
        predicted_seconds: prediction.seconds,
        marker_label,
        faster_share: faster as f64 / times.len() as f64,
        histogram,
        svg,
    })
}

/// Histogram bars with a vertical marker at the predicted time.
pub fn render_svg(hist: &Histogram, marker: f64, label: &str, category: &Category) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (1200, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let lo = hist.min.min(marker);
        let hi = hist.max().max(marker);
        let pad = ((hi - lo) * 0.02).max(1.0);
        let y_max = hist.counts.iter().copied().max().unwrap_or(0) + 1;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Finish time distribution - {}", category), ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d((lo - pad)..(hi + pad), 0u32..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Half-marathon time (seconds)")
            .y_desc("Runners")
            .light_line_style(BLACK.mix(0.05))
            .draw()?;

        chart.draw_series(hist.bins().map(|(x0, x1, c)| {
            let mut bar = Rectangle::new([(x0, 0), (x1, c)], BAR_COLOR.mix(0.7).filled());
            bar.set_margin(0, 0, 1, 1);
            bar
        }))?;

        chart
            .draw_series(LineSeries::new(
                vec![(marker, 0), (marker, y_max)],
                RED.stroke_width(3),
            ))?
            .label(label)
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(3)));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
    }
    Ok(svg)
}
