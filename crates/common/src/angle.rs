use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vantage point of a still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureAngle {
    Front,
    Side,
    Top,
    Isometric,
    /// Wherever the live camera is.
    Current,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown capture angle '{0}' (expected front, side, top, isometric or current)")]
pub struct UnknownAngle(pub String);

impl CaptureAngle {
    pub const ALL: [CaptureAngle; 5] = [
        CaptureAngle::Front,
        CaptureAngle::Side,
        CaptureAngle::Top,
        CaptureAngle::Isometric,
        CaptureAngle::Current,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureAngle::Front => "front",
            CaptureAngle::Side => "side",
            CaptureAngle::Top => "top",
            CaptureAngle::Isometric => "isometric",
            CaptureAngle::Current => "current",
        }
    }
}

impl fmt::Display for CaptureAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureAngle {
    type Err = UnknownAngle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAngle(s.to_string()))
    }
}
