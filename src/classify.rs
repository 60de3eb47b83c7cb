//! Size tiers for accepted bounding boxes.

use serde::Serialize;

use crate::{
    bbox::BoundingBox,
    status::{StatusColor, StatusLine},
};

pub const LARGE_AREA_M2: f64 = 12_332_660.00;
pub const TOO_LARGE_AREA_M2: f64 = 36_084_700.00;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AreaTier {
    Normal,
    Large,
    TooLarge,
}

impl AreaTier {
    /// Thresholds are exclusive: an area exactly on a boundary stays in the lower tier.
    pub fn from_area(area_m2: f64) -> Self {
        if area_m2 > TOO_LARGE_AREA_M2 {
            AreaTier::TooLarge
        } else if area_m2 > LARGE_AREA_M2 {
            AreaTier::Large
        } else {
            AreaTier::Normal
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AreaTier::Normal => "Selection confirmed!",
            AreaTier::Large => "The area is quite large and may take a long time to generate.",
            AreaTier::TooLarge => {
                "This area is very large and could exceed typical computing limits."
            }
        }
    }

    pub fn color(self) -> StatusColor {
        match self {
            AreaTier::Normal => StatusColor::Success,
            AreaTier::Large => StatusColor::Warning,
            AreaTier::TooLarge => StatusColor::Error,
        }
    }

    pub fn is_warning(self) -> bool {
        !matches!(self, AreaTier::Normal)
    }

    pub fn status(self) -> StatusLine {
        StatusLine::new(self.message(), self.color())
    }
}

pub fn classify(bbox: &BoundingBox) -> AreaTier {
    AreaTier::from_area(bbox.area())
}
