use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    /// `https://...` bucket URL or a local directory.
    pub model_store: String,
    pub model_key: String,
    pub meta_key: String,
    pub dataset_key: String,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_temperature: 0.1,
            model_store: "https://fra1.digitaloceanspaces.com/pracadomowamodul9".to_string(),
            model_key: "processed/best_model.pt".to_string(),
            meta_key: "processed/model_meta.json".to_string(),
            dataset_key: "processed/df.csv".to_string(),
            http_timeout_secs: 60,
        }
    }
}

impl Config {
    /// JSON file named by `CONFIG_PATH` (if any), then environment overrides.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = match get("CONFIG_PATH") {
            Some(path) => {
                let data = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config at {}", path))?;
                serde_json::from_str(&data).with_context(|| format!("invalid config JSON in {}", path))?
            }
            None => Config::default(),
        };

        let set = |target: &mut String, key: &str| {
            if let Some(v) = get(key).filter(|v| !v.is_empty()) {
                *target = v;
            }
        };
        set(&mut cfg.openai_api_key, "OPENAI_API_KEY");
        set(&mut cfg.openai_base_url, "OPENAI_BASE_URL");
        set(&mut cfg.openai_model, "OPENAI_MODEL");
        set(&mut cfg.model_store, "MODEL_STORE");
        set(&mut cfg.model_key, "MODEL_KEY");
        set(&mut cfg.meta_key, "META_KEY");
        set(&mut cfg.dataset_key, "DATASET_KEY");

        if let Some(v) = get("PORT").filter(|v| !v.is_empty()) {
            cfg.port = v.parse().with_context(|| format!("PORT={} is not a port", v))?;
        }
        if let Some(v) = get("OPENAI_TEMPERATURE").filter(|v| !v.is_empty()) {
            cfg.openai_temperature = v
                .parse()
                .with_context(|| format!("OPENAI_TEMPERATURE={} is not a number", v))?;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECS").filter(|v| !v.is_empty()) {
            cfg.http_timeout_secs = v
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT_SECS={} is not a number", v))?;
        }

        if cfg.openai_api_key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY not set");
        }
        Ok(cfg)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| m.get(k).cloned()
    }

    #[test]
    fn defaults_plus_env() {
        let cfg = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test"), ("PORT", "9000")])).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.openai_model, "gpt-4o-mini");
        assert_eq!(cfg.dataset_key, "processed/df.csv");
        assert_eq!(cfg.http_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("OPENAI_API_KEY", "")])).is_err());
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(Config::from_lookup(lookup(&[("OPENAI_API_KEY", "k"), ("PORT", "http")])).is_err());
    }

    #[test]
    fn empty_numeric_vars_keep_defaults() {
        let cfg = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "k"),
            ("PORT", ""),
            ("OPENAI_TEMPERATURE", ""),
            ("HTTP_TIMEOUT_SECS", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.openai_temperature, 0.1);
        assert_eq!(cfg.http_timeout_secs, 60);
    }

    #[test]
    fn file_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"openai_api_key":"from-file","model_store":"/srv/models","port":7000}"#,
        )
        .unwrap();
        let p = path.to_string_lossy().to_string();

        let cfg = Config::from_lookup(lookup(&[("CONFIG_PATH", p.as_str()), ("MODEL_STORE", "./local")])).unwrap();
        assert_eq!(cfg.openai_api_key, "from-file");
        assert_eq!(cfg.model_store, "./local");
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.meta_key, "processed/model_meta.json");
    }
}
