//! Single-flight generation lifecycle.
//!
//! One latch gates the `Idle -> Dispatching` transition. It is claimed with a
//! compare-and-set so that concurrent triggers produce exactly one dispatch,
//! and it is released either when dispatch fails or when the progress stream
//! reports a terminal (`Done!` / `Error!`) message.

use std::{
    future::Future,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    bbox::BoundingBox,
    progress::{ProgressEvent, Terminal},
    selection::SelectionState,
    status::{StatusColor, StatusLine},
};

pub const DEFAULT_FLOODFILL_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_GROUND_LEVEL: i32 = 20;
pub const MIN_GROUND_LEVEL: i32 = -62;
pub const DEFAULT_SCALE: f64 = 1.0;

/// Raw form values as read from the settings controls.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobForm {
    #[serde(default, deserialize_with = "lenient_text")]
    pub scale: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub floodfill_timeout: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ground_level: Option<String>,
    #[serde(default)]
    pub winter_mode: bool,
}

/// Form controls may post numbers or strings; both are kept as text.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Other(serde_json::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(text)) => Some(text),
        Some(Raw::Number(number)) => Some(number.to_string()),
        Some(Raw::Other(_)) | None => None,
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JobParams {
    pub scale: f64,
    pub floodfill_timeout_secs: u64,
    pub ground_level: i32,
    pub winter_mode: bool,
}

impl JobForm {
    /// Out-of-range or unparsable values fall back to their defaults.
    pub fn params(&self) -> JobParams {
        let scale = parse_field::<f64>(&self.scale)
            .filter(|scale| scale.is_finite() && *scale > 0.0)
            .unwrap_or(DEFAULT_SCALE);
        let floodfill_timeout_secs = parse_field::<i64>(&self.floodfill_timeout)
            .and_then(|secs| u64::try_from(secs).ok())
            .unwrap_or(DEFAULT_FLOODFILL_TIMEOUT_SECS);
        let ground_level = parse_field::<i32>(&self.ground_level)
            .filter(|level| *level >= MIN_GROUND_LEVEL)
            .unwrap_or(DEFAULT_GROUND_LEVEL);
        JobParams {
            scale,
            floodfill_timeout_secs,
            ground_level,
            winter_mode: self.winter_mode,
        }
    }
}

fn parse_field<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|raw| raw.trim().parse().ok())
}

/// A job as handed to the external executor.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub bbox_text: String,
    pub selected_world: PathBuf,
    pub world_scale: f64,
    pub ground_level: i32,
    pub winter_mode: bool,
    pub floodfill_timeout: u64,
}

impl DispatchRequest {
    pub fn new(bbox: &BoundingBox, world: PathBuf, params: JobParams) -> Self {
        Self {
            bbox_text: bbox.to_bbox_text(),
            selected_world: world,
            world_scale: params.scale,
            ground_level: params.ground_level,
            winter_mode: params.winter_mode,
            floodfill_timeout: params.floodfill_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// Accepts a job and starts it. Completion is reported through the progress stream.
pub trait JobExecutor: Send + Sync {
    fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Choose a location first!")]
    NoSelection,
    #[error("Select a Minecraft world first!")]
    NoTarget,
    #[error("Error starting generation: {0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// Latch was closed; nothing happened.
    Ignored,
    Rejected(LifecycleError),
    Dispatched(DispatchRequest),
    Failed(LifecycleError),
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerationStatus {
    pub percent: f64,
    pub line: StatusLine,
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self {
            percent: 0.0,
            line: StatusLine::neutral(),
        }
    }
}

pub struct GenerationLifecycle<E> {
    executor: E,
    enabled: AtomicBool,
    status: Mutex<GenerationStatus>,
}

impl<E: JobExecutor> GenerationLifecycle<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            enabled: AtomicBool::new(true),
            status: Mutex::new(GenerationStatus::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> GenerationStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    pub async fn trigger(&self, selection: &SelectionState, form: &JobForm) -> TriggerOutcome {
        if !self.is_enabled() {
            debug!("generation already in flight, trigger ignored");
            return TriggerOutcome::Ignored;
        }

        let Some(bbox) = selection.usable_bbox() else {
            return self.reject(LifecycleError::NoSelection);
        };
        let Some(world) = selection.target().usable_path() else {
            return self.reject(LifecycleError::NoTarget);
        };

        let request = DispatchRequest::new(&bbox, world.to_path_buf(), form.params());

        if self
            .enabled
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("lost the race for the generation latch");
            return TriggerOutcome::Ignored;
        }

        info!(
            bbox = %request.bbox_text,
            world = %request.selected_world.display(),
            "dispatching generation"
        );
        match self.executor.dispatch(request.clone()).await {
            Ok(()) => TriggerOutcome::Dispatched(request),
            Err(err) => {
                self.enabled.store(true, Ordering::SeqCst);
                let err = LifecycleError::from(err);
                warn!("{err}");
                self.set_line(StatusLine::error(err.to_string()));
                TriggerOutcome::Failed(err)
            }
        }
    }

    fn reject(&self, err: LifecycleError) -> TriggerOutcome {
        self.set_line(StatusLine::error(err.to_string()));
        TriggerOutcome::Rejected(err)
    }

    fn set_line(&self, line: StatusLine) {
        self.status.lock().expect("status lock poisoned").line = line;
    }

    pub fn apply_progress(&self, event: &ProgressEvent) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if let Some(percent) = event.percent() {
            status.percent = percent;
        }
        let Some(text) = event.text() else {
            return;
        };
        let color = match event.terminal() {
            Some(Terminal::Failure) => {
                self.enabled.store(true, Ordering::SeqCst);
                warn!("{text}");
                StatusColor::Error
            }
            Some(Terminal::Success) => {
                self.enabled.store(true, Ordering::SeqCst);
                info!("{text}");
                StatusColor::Success
            }
            None => StatusColor::Neutral,
        };
        status.line = StatusLine::new(text, color);
    }
}
