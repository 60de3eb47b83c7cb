//! Bounding-box acquisition and validation.
//!
//! Two inputs feed the same acceptance step: free text typed by the user
//! (`lat,lng,lat,lng`) and messages from the coordinate picker, which are
//! already space-separated in `lng lat lng lat` order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    classify::{classify, AreaTier},
    geo::{estimate_area, normalize_longitude},
};

static COORDINATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(-?\d+(?:\.\d+)?)(?:,|\s+)(-?\d+(?:\.\d+)?)(?:,|\s+)(-?\d+(?:\.\d+)?)(?:,|\s+)(-?\d+(?:\.\d+)?)$",
    )
    .expect("coordinate pattern compiles")
});

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lng1: f64,
    pub lat1: f64,
    pub lng2: f64,
    pub lat2: f64,
}

impl BoundingBox {
    pub fn new(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> Self {
        Self {
            lng1,
            lat1,
            lng2,
            lat2,
        }
    }

    /// The all-zero box means "nothing selected".
    pub fn is_sentinel(&self) -> bool {
        self.lng1 == 0.0 && self.lat1 == 0.0 && self.lng2 == 0.0 && self.lat2 == 0.0
    }

    pub fn area(&self) -> f64 {
        estimate_area(self.lng1, self.lat1, self.lng2, self.lat2)
    }

    /// Space-joined `lng1 lat1 lng2 lat2`, the form the generator expects.
    pub fn to_bbox_text(&self) -> String {
        format!("{} {} {} {}", self.lng1, self.lat1, self.lng2, self.lat2)
    }
}

/// Coordinates pushed by the map picker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BboxMessage {
    pub bbox_text: String,
}

impl BboxMessage {
    pub fn new(bbox_text: impl Into<String>) -> Self {
        Self {
            bbox_text: bbox_text.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BBoxError {
    #[error("Invalid format. Please use 'lat,lng,lat,lng' or 'lat lng lat lng'.")]
    Format,
    #[error(
        "Error: Coordinates are out of range or incorrectly ordered (Lat before Lng required)."
    )]
    RangeOrOrder,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BBoxOutcome {
    Cleared,
    Accepted { bbox: BoundingBox, tier: AreaTier },
}

/// Validates user-typed coordinates.
pub fn parse_text(input: &str) -> Result<BBoxOutcome, BBoxError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(BBoxOutcome::Cleared);
    }

    let captures = COORDINATE_PATTERN
        .captures(input)
        .ok_or(BBoxError::Format)?;
    let mut coords = [0.0_f64; 4];
    for (slot, idx) in coords.iter_mut().zip(1..=4) {
        *slot = captures[idx].parse().map_err(|_| BBoxError::Format)?;
    }

    let [lat1, lng1, lat2, lng2] = coords;
    let lat_ok = |lat: f64| (-90.0..=90.0).contains(&lat);
    let lng_ok = |lng: f64| (-180.0..=180.0).contains(&lng);
    if !(lat_ok(lat1) && lat_ok(lat2) && lng_ok(lng1) && lng_ok(lng2)) {
        return Err(BBoxError::RangeOrOrder);
    }

    Ok(accept([lat1, lng1, lat2, lng2]))
}

/// Validates a picker message carrying `lng1 lat1 lng2 lat2`.
pub fn parse_message(message: &BboxMessage) -> Result<BBoxOutcome, BBoxError> {
    let values: Vec<f64> = message
        .bbox_text
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .map_err(|_| BBoxError::Format)?;
    let coords: [f64; 4] = values.try_into().map_err(|_| BBoxError::Format)?;
    if coords.iter().any(|value| !value.is_finite()) {
        return Err(BBoxError::Format);
    }
    Ok(accept(coords))
}

/// Shared acceptance step. Values are taken positionally as
/// `lng1, lat1, lng2, lat2`; the second and fourth go through the
/// longitude normalizer.
fn accept([lng1, lat1, lng2, lat2]: [f64; 4]) -> BBoxOutcome {
    let bbox = BoundingBox::new(
        lng1,
        normalize_longitude(lat1),
        lng2,
        normalize_longitude(lat2),
    );
    if bbox.is_sentinel() {
        return BBoxOutcome::Cleared;
    }
    BBoxOutcome::Accepted {
        bbox,
        tier: classify(&bbox),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(outcome: BBoxOutcome) -> BoundingBox {
        match outcome {
            BBoxOutcome::Accepted { bbox, .. } => bbox,
            BBoxOutcome::Cleared => panic!("expected an accepted box"),
        }
    }

    #[test]
    fn comma_and_space_separators_agree() {
        let comma = accepted(parse_text("10,20,30,40").unwrap());
        let space = accepted(parse_text("10 20 30 40").unwrap());
        assert_eq!(comma, space);
        assert_eq!(comma, BoundingBox::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn whitespace_runs_and_padding_are_accepted() {
        let bbox = accepted(parse_text("  52.5   13.25\t52.75 13.5 ").unwrap());
        assert_eq!(bbox, BoundingBox::new(52.5, 13.25, 52.75, 13.5));
    }

    #[test]
    fn empty_input_clears() {
        assert_eq!(parse_text("   "), Ok(BBoxOutcome::Cleared));
        assert_eq!(parse_text(""), Ok(BBoxOutcome::Cleared));
    }

    #[test]
    fn format_errors() {
        for input in [
            "abc",
            "10,20,30",
            "10,20,30,40,50",
            "10;20;30;40",
            "1e3,2,3,4",
            "+1,2,3,4",
        ] {
            assert_eq!(parse_text(input), Err(BBoxError::Format), "{input}");
        }
    }

    #[test]
    fn range_errors() {
        assert_eq!(parse_text("100,20,30,40"), Err(BBoxError::RangeOrOrder));
        assert_eq!(parse_text("10,200,30,40"), Err(BBoxError::RangeOrOrder));
        assert_eq!(parse_text("10,20,-90.5,40"), Err(BBoxError::RangeOrOrder));
        assert_eq!(parse_text("10,20,30,-181"), Err(BBoxError::RangeOrOrder));
        assert!(BBoxError::RangeOrOrder
            .to_string()
            .contains("Lat before Lng"));
    }

    #[test]
    fn range_edges_are_inclusive() {
        assert!(parse_text("-90,-180,90,180").is_ok());
    }

    #[test]
    fn all_zero_text_clears() {
        assert_eq!(parse_text("0,0,0,0"), Ok(BBoxOutcome::Cleared));
    }

    #[test]
    fn sentinel_message_clears() {
        let outcome = parse_message(&BboxMessage::new("0 0 0 0")).unwrap();
        assert_eq!(outcome, BBoxOutcome::Cleared);
    }

    #[test]
    fn message_normalizes_second_and_fourth_fields() {
        let bbox = accepted(parse_message(&BboxMessage::new("13.38 412.5 13.40 -200")).unwrap());
        assert_eq!(bbox.lng1, 13.38);
        assert_eq!(bbox.lat1, 52.5);
        assert_eq!(bbox.lng2, 13.40);
        assert_eq!(bbox.lat2, 160.0);
    }

    #[test]
    fn malformed_message_is_a_format_error() {
        for text in ["", "1 2 3", "1 2 3 x", "1 2 3 4 5", "1 2 NaN 4"] {
            assert_eq!(
                parse_message(&BboxMessage::new(text)),
                Err(BBoxError::Format),
                "{text}"
            );
        }
    }

    #[test]
    fn bbox_text_is_space_joined() {
        let bbox = BoundingBox::new(13.38, 52.51, 13.4, 52.52);
        assert_eq!(bbox.to_bbox_text(), "13.38 52.51 13.4 52.52");
    }

    #[test]
    fn message_deserializes_from_camel_case() {
        let message: BboxMessage = serde_json::from_str(r#"{"bboxText":"1 2 3 4"}"#).unwrap();
        assert_eq!(message.bbox_text, "1 2 3 4");
    }
}
