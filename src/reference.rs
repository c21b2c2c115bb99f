//! Historical runners used for the comparison chart.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;

use crate::store::ObjectStore;
use crate::types::{Category, Sex};

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub sex: Sex,
    pub category: String,
    pub finish_time_seconds: f64,
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(alias = "Płeć")]
    sex: String,
    #[serde(alias = "Kategoria wiekowa")]
    category: String,
    #[serde(alias = "Czas")]
    finish_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceDataset {
    rows: Vec<ReferenceRow>,
}

impl ReferenceDataset {
    pub fn new(rows: Vec<ReferenceRow>) -> Self {
        Self { rows }
    }

    /// Parse CSV with a header row. Extra columns are ignored, as are rows
    /// without a finish time or with a sex code we don't know.
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(bytes);
        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for (i, rec) in rdr.deserialize::<CsvRow>().enumerate() {
            let rec = rec.with_context(|| format!("bad reference row {}", i + 1))?;
            match (Sex::from_code(&rec.sex), rec.finish_time_seconds) {
                (Some(sex), Some(t)) if t.is_finite() => rows.push(ReferenceRow {
                    sex,
                    category: normalize_category(&rec.category),
                    finish_time_seconds: t,
                }),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!("reference dataset: skipped {} incomplete rows", skipped);
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finish times of rows whose sex AND category both equal the query.
    pub fn finish_times(&self, sex: Sex, category: &Category) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|r| r.sex == sex && r.category == category.as_str())
            .map(|r| r.finish_time_seconds)
            .collect()
    }
}

/// Rewrite the leading sex letter to its canonical code ("K30" → "F30").
fn normalize_category(raw: &str) -> String {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match chars.next().and_then(|c| Sex::from_code(&c.to_string())) {
        Some(sex) => format!("{}{}", sex.code(), chars.as_str()),
        None => raw.to_string(),
    }
}

/// Read-through cache for the dataset at one fixed store key. A failed
/// load is not remembered; the next request tries again.
pub struct ReferenceCache {
    store: ObjectStore,
    key: String,
    loaded: RwLock<Option<Arc<ReferenceDataset>>>,
}

impl ReferenceCache {
    pub fn new(store: ObjectStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            loaded: RwLock::new(None),
        }
    }

    /// A cache that already holds `dataset`; the store is never consulted.
    pub fn preloaded(store: ObjectStore, key: impl Into<String>, dataset: ReferenceDataset) -> Self {
        Self {
            store,
            key: key.into(),
            loaded: RwLock::new(Some(Arc::new(dataset))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.read().is_some()
    }

    pub async fn get(&self) -> Result<Arc<ReferenceDataset>> {
        let cached = self.loaded.read().clone();
        if let Some(ds) = cached {
            return Ok(ds);
        }

        let bytes = self.store.fetch(&self.key).await?;
        let ds = Arc::new(
            ReferenceDataset::from_csv(&bytes)
                .with_context(|| format!("decoding {}", self.store.describe(&self.key)))?,
        );
        tracing::info!("loaded reference dataset {} ({} rows)", self.key, ds.len());

        // Overlapping first loads: keep whichever landed first.
        let mut slot = self.loaded.write();
        Ok(Arc::clone(slot.get_or_insert(ds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Płeć,Kategoria wiekowa,Czas,Miejsce
M,M30,6100,1
M,M30,6500.5,2
M,M40,5900,3
K,K30,7000,4
F,F30,7100,5
M,M30,,6
";

    #[test]
    fn parses_polish_headers_and_skips_gaps() {
        let ds = ReferenceDataset::from_csv(CSV.as_bytes()).unwrap();
        assert_eq!(ds.len(), 5);
        let m30 = ds.finish_times(Sex::Male, &Category::new(Sex::Male, "30"));
        assert_eq!(m30, vec![6100.0, 6500.5]);
        let f30 = ds.finish_times(Sex::Female, &Category::new(Sex::Female, "30"));
        assert_eq!(f30, vec![7000.0, 7100.0]);
    }

    #[test]
    fn parses_english_headers() {
        let csv = "sex,category,finish_time_seconds\nF,F20,6000\n";
        let ds = ReferenceDataset::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(ds.finish_times(Sex::Female, &Category::new(Sex::Female, "20")), vec![6000.0]);
    }

    #[test]
    fn filter_is_exact_conjunction() {
        let ds = ReferenceDataset::new(vec![
            ReferenceRow { sex: Sex::Male, category: "M30".into(), finish_time_seconds: 1.0 },
            ReferenceRow { sex: Sex::Male, category: "M40".into(), finish_time_seconds: 2.0 },
            ReferenceRow { sex: Sex::Male, category: "M300".into(), finish_time_seconds: 3.0 },
            ReferenceRow { sex: Sex::Female, category: "M30".into(), finish_time_seconds: 4.0 },
        ]);
        assert_eq!(ds.finish_times(Sex::Male, &Category::new(Sex::Male, "30")), vec![1.0]);
        assert!(ds.finish_times(Sex::Female, &Category::new(Sex::Female, "30")).is_empty());
    }

    #[tokio::test]
    async fn cache_loads_once_and_retries_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::Local(dir.path().to_path_buf());
        let cache = ReferenceCache::new(store, "df.csv");

        assert!(cache.get().await.is_err());
        assert!(!cache.is_loaded());

        std::fs::write(dir.path().join("df.csv"), CSV).unwrap();
        let first = cache.get().await.unwrap();
        assert!(cache.is_loaded());

        std::fs::remove_file(dir.path().join("df.csv")).unwrap();
        let second = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
