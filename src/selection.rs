use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    bbox::{BBoxOutcome, BoundingBox},
    classify::AreaTier,
};

/// Outcome of picking an output world.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path")]
pub enum TargetRef {
    Selected(PathBuf),
    #[default]
    Empty,
    NoTargetSelected,
    InvalidTarget,
    TargetInUse,
    TargetRootNotFound,
}

impl TargetRef {
    /// The world directory, when this outcome is usable for generation.
    pub fn usable_path(&self) -> Option<&Path> {
        match self {
            TargetRef::Selected(path) if !path.as_os_str().is_empty() => Some(path),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TargetRef::Selected(path) => path.display().to_string(),
            TargetRef::Empty => String::new(),
            TargetRef::NoTargetSelected => "No world selected".into(),
            TargetRef::InvalidTarget => "Invalid Minecraft world".into(),
            TargetRef::TargetInUse => "The selected world is currently in use".into(),
            TargetRef::TargetRootNotFound => "Minecraft directory not found.".into(),
        }
    }
}

/// What the user has picked so far. Lives as long as the session that owns it.
#[derive(Clone, Debug, Default)]
pub struct SelectionState {
    bbox: Option<(BoundingBox, AreaTier)>,
    target: TargetRef,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox.map(|(bbox, _)| bbox)
    }

    pub fn tier(&self) -> Option<AreaTier> {
        self.bbox.map(|(_, tier)| tier)
    }

    /// Present and not the all-zero sentinel.
    pub fn usable_bbox(&self) -> Option<BoundingBox> {
        self.bbox().filter(|bbox| !bbox.is_sentinel())
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn apply(&mut self, outcome: BBoxOutcome) {
        match outcome {
            BBoxOutcome::Cleared => self.clear_bbox(),
            BBoxOutcome::Accepted { bbox, tier } => self.bbox = Some((bbox, tier)),
        }
    }

    pub fn clear_bbox(&mut self) {
        self.bbox = None;
    }

    pub fn set_target(&mut self, target: TargetRef) {
        self.target = target;
    }
}
