use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Fetch-by-key access to the model artifacts and the reference dataset.
#[derive(Debug, Clone)]
pub enum ObjectStore {
    Local(PathBuf),
    Http { client: reqwest::Client, base: String },
}

impl ObjectStore {
    /// `http(s)://...` → objects at `{base}/{key}`; `file://path` or a bare
    /// path → a local directory.
    pub fn from_location(location: &str, timeout: Duration) -> Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let client = reqwest::Client::builder().timeout(timeout).build()?;
            return Ok(ObjectStore::Http {
                client,
                base: location.trim_end_matches('/').to_string(),
            });
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        Ok(ObjectStore::Local(PathBuf::from(path)))
    }

    pub fn describe(&self, key: &str) -> String {
        match self {
            ObjectStore::Local(root) => root.join(key).display().to_string(),
            ObjectStore::Http { base, .. } => format!("{}/{}", base, key),
        }
    }

    pub async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let key = key.trim_start_matches('/');
        match self {
            ObjectStore::Local(root) => {
                let path = root.join(key);
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))
            }
            ObjectStore::Http { client, base } => {
                let url = format!("{}/{}", base, key);
                let resp = client
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("GET {} failed", url))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("GET {} returned {}", url, status);
                }
                let bytes = resp
                    .bytes()
                    .await
                    .with_context(|| format!("reading body of {}", url))?;
                Ok(bytes.to_vec())
            }
        }
    }
}
