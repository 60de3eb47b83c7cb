use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::watch};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::info;

use crate::{
    bbox::BboxMessage,
    executor::CommandExecutor,
    lifecycle::{DispatchRequest, JobForm, TriggerOutcome},
    progress::ProgressReporter,
    selection::TargetRef,
    session::{Session, SessionSnapshot},
    status::StatusLine,
    target,
};

pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
    pub generator: PathBuf,
    pub generator_args: Vec<String>,
    pub saves_dir: Option<PathBuf>,
    pub progress_capacity: usize,
}

#[derive(Clone)]
struct AppState {
    session: Arc<Session<CommandExecutor>>,
    reporter: ProgressReporter,
    picker: Arc<watch::Sender<Option<BboxMessage>>>,
    saves_dir: Option<PathBuf>,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        host,
        port,
        generator,
        generator_args,
        saves_dir,
        progress_capacity,
    } = config;

    let reporter = ProgressReporter::new(progress_capacity);
    let executor = CommandExecutor::new(generator, generator_args, reporter.clone());
    let session = Arc::new(Session::new(executor));
    let (picker_tx, picker_rx) = watch::channel(None);

    session.listen_picker(picker_rx);
    session.listen_progress(reporter.subscribe());

    let state = AppState {
        session,
        reporter,
        picker: Arc::new(picker_tx),
        saves_dir: saves_dir.or_else(target::default_saves_dir),
    };

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    info!("control API listening on http://{addr} (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/version", get(version))
        .route("/api/bbox", post(submit_bbox))
        .route("/api/bbox/picked", post(picked_bbox))
        .route("/api/target", post(select_target))
        .route("/api/generate", post(start_generation))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down control API");
}

async fn latest_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[derive(Deserialize)]
struct BboxInput {
    text: String,
}

async fn submit_bbox(
    State(state): State<AppState>,
    Json(input): Json<BboxInput>,
) -> Json<StatusLine> {
    Json(state.session.submit_bbox_text(&input.text))
}

async fn picked_bbox(
    State(state): State<AppState>,
    Json(message): Json<BboxMessage>,
) -> StatusCode {
    state.picker.send_replace(Some(message));
    StatusCode::ACCEPTED
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInput {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    generate_new: bool,
}

async fn select_target(
    State(state): State<AppState>,
    Json(input): Json<TargetInput>,
) -> Json<TargetRef> {
    let saves_dir = state.saves_dir.clone();
    let path = input.path;
    let generate_new = input.generate_new;
    let resolved = tokio::task::spawn_blocking(move || {
        if generate_new {
            target::resolve_new(saves_dir.as_deref())
        } else {
            target::resolve_existing(path.as_deref())
        }
    })
    .await
    .unwrap_or(TargetRef::InvalidTarget);
    state.session.set_target(resolved.clone());
    Json(resolved)
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
enum GenerateResponse {
    Ignored,
    Rejected { status: StatusLine },
    Dispatched { request: DispatchRequest },
    Failed { status: StatusLine },
}

async fn start_generation(
    State(state): State<AppState>,
    Json(form): Json<JobForm>,
) -> impl IntoResponse {
    let response = match state.session.trigger(&form).await {
        TriggerOutcome::Ignored => (StatusCode::CONFLICT, GenerateResponse::Ignored),
        TriggerOutcome::Rejected(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            GenerateResponse::Rejected {
                status: StatusLine::error(err.to_string()),
            },
        ),
        TriggerOutcome::Dispatched(request) => {
            (StatusCode::ACCEPTED, GenerateResponse::Dispatched { request })
        }
        TriggerOutcome::Failed(err) => (
            StatusCode::BAD_GATEWAY,
            GenerateResponse::Failed {
                status: StatusLine::error(err.to_string()),
            },
        ),
    };
    (response.0, Json(response.1))
}

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.reporter.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => Event::default()
            .event("progress")
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(program: &str) -> AppState {
        let reporter = ProgressReporter::new(16);
        let executor = CommandExecutor::new(program, Vec::new(), reporter.clone());
        let (picker, _) = watch::channel(None);
        AppState {
            session: Arc::new(Session::new(executor)),
            reporter,
            picker: Arc::new(picker),
            saves_dir: None,
        }
    }

    fn select(state: &AppState) {
        state.session.submit_bbox_text("52.5125,13.3875,52.5188,13.4");
        state
            .session
            .set_target(TargetRef::Selected(PathBuf::from("/saves/Arnis World 1")));
    }

    async fn generate(state: &AppState) -> StatusCode {
        start_generation(State(state.clone()), Json(JobForm::default()))
            .await
            .into_response()
            .status()
    }

    #[tokio::test]
    async fn missing_selection_is_unprocessable() {
        let state = state("true");
        assert_eq!(generate(&state).await, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn spawn_failure_is_bad_gateway() {
        let state = state("/definitely/not/a/generator");
        select(&state);
        assert_eq!(generate(&state).await, StatusCode::BAD_GATEWAY);
        assert!(state.session.lifecycle().is_enabled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn running_job_turns_away_second_request() {
        let state = state("true");
        select(&state);
        assert_eq!(generate(&state).await, StatusCode::ACCEPTED);
        assert_eq!(generate(&state).await, StatusCode::CONFLICT);
    }
}
