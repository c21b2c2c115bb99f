//! Free text → [`RawExtraction`] via an external chat-completion service.
//!
//! The service is asked for a single JSON object with exactly three keys.
//! We never interpret the user's text ourselves; we only decode what the
//! service returns.

use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn, Instrument};

use crate::error::PipelineError;
use crate::types::{RawExtraction, Sex};

pub const SYSTEM_PROMPT: &str = "You are an assistant that analyses runner data.
From the given text extract:
1. Sex: 'M' for a man or 'K' for a woman
2. Age: an integer number of years
3. 5 km run time in seconds: convert the given time (minutes/seconds) into a whole number of seconds

Reply ONLY with JSON, without any extra commentary:
{
    \"sex\": \"M\" or \"K\",
    \"age\": number,
    \"five_km_seconds\": number
}

If some information cannot be determined, use null.";

/// Anything that can answer a system+user prompt pair with text.
pub trait CompletionService: Send + Sync {
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
}

// ---------- OpenAI-compatible backend ----------

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }
}

impl CompletionService for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": self.temperature,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat completion returned {}: {}", status, text);
        }
        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat completion returned no message content"))
    }
}

// ---------- Extractor ----------

pub struct Extractor<C> {
    service: C,
}

impl<C: CompletionService> Extractor<C> {
    pub fn new(service: C) -> Self {
        Self { service }
    }

    pub async fn extract(&self, text: &str) -> Result<RawExtraction, PipelineError> {
        let span = tracing::info_span!("extract_runner_data", input_len = text.len());
        async {
            let started = Instant::now();
            let user = format!("User text: {}", text);
            let reply = self
                .service
                .complete(SYSTEM_PROMPT, &user)
                .await
                .map_err(|e| {
                    warn!("completion failed after {}ms: {:#}", started.elapsed().as_millis(), e);
                    PipelineError::ExtractionService(format!("{:#}", e))
                })?;
            let raw = parse_payload(&reply)?;
            info!(
                "extracted sex={:?} age={:?} five_km_seconds={:?} in {}ms",
                raw.sex,
                raw.age,
                raw.five_km_seconds,
                started.elapsed().as_millis()
            );
            Ok::<_, PipelineError>(raw)
        }
        .instrument(span)
        .await
    }
}

// Extra keys are ignored; only these three are read.
#[derive(Deserialize)]
struct WirePayload {
    #[serde(default, alias = "plec")]
    sex: Value,
    #[serde(default, alias = "wiek")]
    age: Value,
    #[serde(default, alias = "czas_5km_sekundy")]
    five_km_seconds: Value,
}

/// Decode the service reply into a [`RawExtraction`].
pub fn parse_payload(reply: &str) -> Result<RawExtraction, PipelineError> {
    let body = strip_code_fence(reply);
    let wire: WirePayload = serde_json::from_str(body)
        .map_err(|e| PipelineError::ExtractionParse(e.to_string()))?;

    let sex = match &wire.sex {
        v if is_falsy(v) => None,
        Value::String(s) => Some(
            Sex::from_code(s)
                .ok_or_else(|| PipelineError::ExtractionParse(format!("unknown sex code {:?}", s)))?,
        ),
        other => {
            return Err(PipelineError::ExtractionParse(format!(
                "sex must be a string, got {}",
                other
            )))
        }
    };

    Ok(RawExtraction {
        sex,
        age: count(&wire.age, "age", true)?,
        five_km_seconds: count(&wire.five_km_seconds, "five_km_seconds", false)?,
    })
}

/// null, false, "", 0, [] and {}: the values a reply uses for "unknown".
fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

// Numeric zero stays `Some(0)`; the validator decides it means "unset".
fn count(v: &Value, name: &str, whole: bool) -> Result<Option<u32>, PipelineError> {
    let bad = || PipelineError::ExtractionParse(format!("{} must be a non-negative number, got {}", name, v));
    match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return u32::try_from(u).map(Some).map_err(|_| bad());
            }
            match n.as_f64() {
                Some(f) if whole && f.fract() != 0.0 => Err(PipelineError::ExtractionParse(format!(
                    "{} must be a whole number, got {}",
                    name, v
                ))),
                Some(f) if f.is_finite() && f >= 0.0 && f < u32::MAX as f64 => Ok(Some(f as u32)),
                _ => Err(bad()),
            }
        }
        v if is_falsy(v) => Ok(None),
        _ => Err(bad()),
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let t = reply.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    // info string: json, JSON, ...
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_english_and_polish_keys() {
        let r = parse_payload(r#"{"sex":"M","age":32,"five_km_seconds":1455}"#).unwrap();
        assert_eq!(r, RawExtraction { sex: Some(Sex::Male), age: Some(32), five_km_seconds: Some(1455) });

        let r = parse_payload(r#"{"plec":"K","wiek":28,"czas_5km_sekundy":1620}"#).unwrap();
        assert_eq!(r.sex, Some(Sex::Female));
        assert_eq!(r.age, Some(28));
        assert_eq!(r.five_km_seconds, Some(1620));
    }

    #[test]
    fn nulls_and_missing_keys_are_absent() {
        let r = parse_payload(r#"{"sex":null,"age":40}"#).unwrap();
        assert_eq!(r.sex, None);
        assert_eq!(r.age, Some(40));
        assert_eq!(r.five_km_seconds, None);
    }

    #[test]
    fn zero_survives_parsing() {
        let r = parse_payload(r#"{"sex":"M","age":0,"five_km_seconds":0}"#).unwrap();
        assert_eq!(r.age, Some(0));
        assert_eq!(r.five_km_seconds, Some(0));
    }

    #[test]
    fn accepts_fenced_json_and_float_numbers() {
        let r = parse_payload("```json\n{\"sex\":\"F\",\"age\":33.0,\"five_km_seconds\":1500.7}\n```").unwrap();
        assert_eq!(r.age, Some(33));
        assert_eq!(r.five_km_seconds, Some(1500));
    }

    #[test]
    fn rejects_malformed_payloads() {
        for bad in [
            "I think you are a man",
            "[1,2,3]",
            r#"{"sex":"X","age":30,"five_km_seconds":1500}"#,
            r#"{"sex":"M","age":-3,"five_km_seconds":1500}"#,
            r#"{"sex":"M","age":"thirty","five_km_seconds":1500}"#,
            r#"{"sex":"M","age":30.5,"five_km_seconds":1500}"#,
            r#"{"sex":true,"age":30,"five_km_seconds":1500}"#,
        ] {
            assert!(
                matches!(parse_payload(bad), Err(PipelineError::ExtractionParse(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn falsy_values_of_any_type_are_absent() {
        for reply in [
            r#"{"sex":false,"age":"","five_km_seconds":false}"#,
            r#"{"sex":0,"age":[],"five_km_seconds":{}}"#,
            r#"{"sex":"  ","age":null,"five_km_seconds":""}"#,
        ] {
            let r = parse_payload(reply).unwrap();
            assert_eq!(r, RawExtraction::default(), "reply {}", reply);
        }
        let r = parse_payload(r#"{"sex":"M","age":"","five_km_seconds":1455}"#).unwrap();
        assert_eq!(r.age, None);
        assert_eq!(r.five_km_seconds, Some(1455));
    }

    #[test]
    fn extra_keys_are_ignored() {
        let r = parse_payload(r#"{"sex":"M","age":32,"five_km_seconds":1455,"note":"ok"}"#).unwrap();
        assert_eq!(r, RawExtraction { sex: Some(Sex::Male), age: Some(32), five_km_seconds: Some(1455) });
    }

    #[test]
    fn fence_info_string_is_case_insensitive() {
        for reply in [
            "```JSON\n{\"sex\":\"M\",\"age\":40,\"five_km_seconds\":1500}\n```",
            "```Json {\"sex\":\"M\",\"age\":40,\"five_km_seconds\":1500}```",
            "```\n{\"sex\":\"M\",\"age\":40,\"five_km_seconds\":1500}\n```",
        ] {
            assert_eq!(parse_payload(reply).unwrap().age, Some(40), "reply {:?}", reply);
        }
    }
}
