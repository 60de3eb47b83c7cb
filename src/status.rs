use serde::{Serialize, Serializer};

/// Display colors shared by every user-facing status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusColor {
    Success,
    Warning,
    Error,
    Neutral,
}

impl StatusColor {
    pub fn hex(self) -> &'static str {
        match self {
            StatusColor::Success => "#7bd864",
            StatusColor::Warning => "#fecc44",
            StatusColor::Error => "#fa7878",
            StatusColor::Neutral => "#ececec",
        }
    }
}

impl Serialize for StatusColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.hex())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusLine {
    pub text: String,
    pub color: StatusColor,
}

impl StatusLine {
    pub fn new(text: impl Into<String>, color: StatusColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }

    pub fn neutral() -> Self {
        Self::new("", StatusColor::Neutral)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, StatusColor::Error)
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::neutral()
    }
}
