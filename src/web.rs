use crate::{
    app::{AppBackend, AppError, AppLocal, HistoryQuery, ImportSummary, Visit, VisitOutcome},
    classify::LabelScores,
    history::HistoryEntry,
    query::SimilarityHit,
    stats::Stats,
    tags::TagCountMap,
};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    app: Arc<AppLocal>,
}

pub fn router(app: Arc<AppLocal>) -> Router {
    let shared_state = Arc::new(SharedState { app });

    Router::new()
        .route("/api/visit", post(visit))
        .route("/api/classify", post(classify))
        .route("/api/simi-search", post(simi_search))
        .route("/api/recommend", post(recommend))
        .route("/api/history", post(history))
        .route("/api/history/:id", get(entry))
        .route("/api/tags", get(tags))
        .route("/api/stats", get(stats))
        .route("/api/labels", get(labels).post(set_labels))
        .route("/api/import", post(import))
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to listen for ctrl+c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutdown requested");
}

async fn start_app(app: Arc<AppLocal>, listen: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("listening on {listen}");

    axum::serve(listener, router(app.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // let queued writes land before the lock is released
    log::warn!("waiting for writer to stop");
    tokio::task::block_in_place(|| app.shutdown());

    Ok(())
}

pub fn start_daemon(app: AppLocal, listen: &str) -> anyhow::Result<()> {
    let app = Arc::new(app);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(app, listen))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::NotFound => axum::http::StatusCode::NOT_FOUND,
            AppError::MalformedInput(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Classify(_) | AppError::Embedding(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Store(_) | AppError::Reqwest(_) | AppError::IO(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn visit(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<Visit>,
) -> Result<Json<VisitOutcome>, HttpError> {
    let app = state.app.clone();

    log::debug!("visit: {payload:?}");

    tokio::task::block_in_place(move || app.visit(payload).map(Into::into).map_err(Into::into))
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

async fn classify(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ClassifyRequest>,
) -> Result<Json<LabelScores>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.classify(&payload.title, &payload.url)
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Debug, Deserialize)]
pub struct SimiSearchRequest {
    pub query: String,
    pub min_score: Option<f32>,
}

async fn simi_search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SimiSearchRequest>,
) -> Result<Json<Vec<SimilarityHit>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.simi_search(&payload.query, payload.min_score)
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendRequest {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

async fn recommend(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RecommendRequest>,
) -> Result<Json<Vec<HistoryEntry>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.recommend(payload.query, payload.limit)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn history(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.history(payload).map(Into::into).map_err(Into::into))
}

async fn entry(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u32>,
) -> Result<Json<HistoryEntry>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.entry(id).map(Into::into).map_err(Into::into))
}

async fn tags(State(state): State<Arc<SharedState>>) -> Result<Json<TagCountMap>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.tag_counts().map(Into::into).map_err(Into::into))
}

async fn stats(State(state): State<Arc<SharedState>>) -> Result<Json<Stats>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.stats().map(Into::into).map_err(Into::into))
}

async fn labels(State(state): State<Arc<SharedState>>) -> Result<Json<Vec<String>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.labels().map(Into::into).map_err(Into::into))
}

#[derive(Debug, Deserialize)]
pub struct LabelsRequest {
    pub labels: Vec<String>,
}

async fn set_labels(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<LabelsRequest>,
) -> Result<Json<Vec<String>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.set_labels(payload.labels)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn import(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<Vec<Visit>>,
) -> Result<Json<ImportSummary>, HttpError> {
    let app = state.app.clone();

    log::info!("importing {} visits", payload.len());

    tokio::task::block_in_place(move || app.import(payload).map(Into::into).map_err(Into::into))
}
