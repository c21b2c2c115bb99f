use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json,
};
use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use hm_predictor::config::Config;
use hm_predictor::extract::OpenAiClient;
use hm_predictor::model::{MetaJson, TorchRegressor};
use hm_predictor::reference::ReferenceCache;
use hm_predictor::store::ObjectStore;
use hm_predictor::{Pipeline, Report};

// ---------- Request types ----------

#[derive(Deserialize, Debug)]
struct PredictIn {
    text: String,
}

// ---------- Server state ----------

type AppPipeline = Pipeline<OpenAiClient, TorchRegressor>;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<AppPipeline>,
}

// ---------- Handlers ----------

async fn predict(
    State(state): State<AppState>,
    Json(payload): Json<PredictIn>,
) -> Result<Json<Report>, (StatusCode, Json<serde_json::Value>)> {
    match state.pipeline.run(&payload.text).await {
        Ok(report) => Ok(Json(report)),
        Err(failure) => {
            tracing::error!("pipeline failed in {}: {}", failure.stage, failure.error);
            let status = StatusCode::from_u16(failure.error.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Err((status, Json(json!({ "error": failure.error.to_string() }))))
        }
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::load()?;
    let store = ObjectStore::from_location(&cfg.model_store, cfg.http_timeout())?;

    // Model is a precondition for every request: load it before listening.
    let meta = MetaJson::from_slice(
        &store
            .fetch(&cfg.meta_key)
            .await
            .with_context(|| format!("fetching {}", store.describe(&cfg.meta_key)))?,
    )?;
    let model_bytes = store
        .fetch(&cfg.model_key)
        .await
        .with_context(|| format!("fetching {}", store.describe(&cfg.model_key)))?;
    let model = TorchRegressor::from_bytes(&model_bytes, meta)?;
    tracing::info!("warmup forward ok");

    let service = OpenAiClient::new(
        cfg.openai_base_url.clone(),
        cfg.openai_api_key.clone(),
        cfg.openai_model.clone(),
        cfg.openai_temperature,
        cfg.http_timeout(),
    )?;
    let reference = Arc::new(ReferenceCache::new(store, cfg.dataset_key.clone()));

    let state = AppState {
        pipeline: Arc::new(Pipeline::new(service, Arc::new(model), reference)),
    };

    let app = axum::Router::new()
        .route("/predict", post(predict))
        .route("/healthz", get(healthz))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
