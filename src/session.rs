//! One application session: the current selection plus the generation lifecycle.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    bbox::{self, BBoxOutcome, BboxMessage, BoundingBox},
    classify::AreaTier,
    lifecycle::{GenerationLifecycle, GenerationStatus, JobExecutor, JobForm, TriggerOutcome},
    progress::ProgressEvent,
    selection::{SelectionState, TargetRef},
    status::StatusLine,
};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub bbox: Option<BoundingBox>,
    pub tier: Option<AreaTier>,
    /// Set when the selected area is large enough to warn about.
    pub size_warning: bool,
    pub bbox_status: StatusLine,
    pub target: TargetRef,
    pub generation_enabled: bool,
    pub generation: GenerationStatus,
}

struct Inner {
    selection: SelectionState,
    bbox_status: StatusLine,
}

pub struct Session<E> {
    inner: Mutex<Inner>,
    lifecycle: GenerationLifecycle<E>,
}

impl<E: JobExecutor> Session<E> {
    pub fn new(executor: E) -> Self {
        Self {
            inner: Mutex::new(Inner {
                selection: SelectionState::new(),
                bbox_status: StatusLine::neutral(),
            }),
            lifecycle: GenerationLifecycle::new(executor),
        }
    }

    pub fn lifecycle(&self) -> &GenerationLifecycle<E> {
        &self.lifecycle
    }

    pub fn selection(&self) -> SelectionState {
        self.lock().selection.clone()
    }

    /// Text typed into the coordinate box.
    pub fn submit_bbox_text(&self, text: &str) -> StatusLine {
        self.apply_bbox(bbox::parse_text(text))
    }

    /// Coordinates delivered by the map picker.
    pub fn submit_bbox_message(&self, message: &BboxMessage) -> StatusLine {
        self.apply_bbox(bbox::parse_message(message))
    }

    fn apply_bbox(&self, result: Result<BBoxOutcome, bbox::BBoxError>) -> StatusLine {
        let mut inner = self.lock();
        let status = match result {
            Ok(outcome) => {
                inner.selection.apply(outcome);
                match outcome {
                    BBoxOutcome::Cleared => StatusLine::neutral(),
                    BBoxOutcome::Accepted { bbox, tier } => {
                        debug!(
                            bbox = %bbox.to_bbox_text(),
                            ?tier,
                            area_m2 = bbox.area(),
                            "bbox accepted"
                        );
                        tier.status()
                    }
                }
            }
            Err(err) => {
                inner.selection.clear_bbox();
                StatusLine::error(err.to_string())
            }
        };
        inner.bbox_status = status.clone();
        status
    }

    pub fn set_target(&self, target: TargetRef) {
        debug!(target = %target.describe(), "target updated");
        self.lock().selection.set_target(target);
    }

    pub async fn trigger(&self, form: &JobForm) -> TriggerOutcome {
        let selection = self.selection();
        self.lifecycle.trigger(&selection, form).await
    }

    pub fn apply_progress(&self, event: &ProgressEvent) {
        self.lifecycle.apply_progress(event);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        let tier = inner.selection.tier();
        SessionSnapshot {
            bbox: inner.selection.bbox(),
            tier,
            size_warning: tier.is_some_and(AreaTier::is_warning),
            bbox_status: inner.bbox_status.clone(),
            target: inner.selection.target().clone(),
            generation_enabled: self.lifecycle.is_enabled(),
            generation: self.lifecycle.status(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("session lock poisoned")
    }
}

impl<E: JobExecutor + 'static> Session<E> {
    /// Applies picker messages as they arrive. Only the latest value is seen.
    pub fn listen_picker(
        self: &Arc<Self>,
        mut rx: watch::Receiver<Option<BboxMessage>>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let message = rx.borrow_and_update().clone();
                if let Some(message) = message {
                    session.submit_bbox_message(&message);
                }
            }
        })
    }

    /// Feeds the progress stream into the lifecycle in arrival order.
    pub fn listen_progress(
        self: &Arc<Self>,
        mut rx: broadcast::Receiver<ProgressEvent>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => session.apply_progress(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "progress listener lagged, skipping stale events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
