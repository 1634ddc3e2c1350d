//! Orientation classification from stream geometry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target ratio for portrait video (9:16).
pub const PORTRAIT_RATIO: f64 = 9.0 / 16.0;

/// Target ratio for landscape video (16:9).
pub const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;

/// Maximum absolute distance from a target ratio that still counts as a match.
pub const RATIO_TOLERANCE: f64 = 0.25;

/// Coarse orientation used to namespace stored objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrientationClass {
    Landscape,
    Portrait,
    Other,
}

impl OrientationClass {
    /// Classify a `width x height` frame.
    ///
    /// Degenerate geometry (a zero dimension) is `Other`.
    pub fn classify(width: u32, height: u32) -> Self {
        Self::classify_with_tolerance(width, height, RATIO_TOLERANCE)
    }

    pub fn classify_with_tolerance(width: u32, height: u32, tolerance: f64) -> Self {
        if width == 0 || height == 0 {
            return Self::Other;
        }

        let ratio = width as f64 / height as f64;
        if (ratio - PORTRAIT_RATIO).abs() <= tolerance {
            Self::Portrait
        } else if (ratio - LANDSCAPE_RATIO).abs() <= tolerance {
            Self::Landscape
        } else {
            Self::Other
        }
    }

    /// Storage namespace for this class.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.prefix()
    }
}

impl fmt::Display for OrientationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_common_resolutions() {
        assert_eq!(OrientationClass::classify(1920, 1080), OrientationClass::Landscape);
        assert_eq!(OrientationClass::classify(1280, 720), OrientationClass::Landscape);
        assert_eq!(OrientationClass::classify(1080, 1920), OrientationClass::Portrait);
        assert_eq!(OrientationClass::classify(720, 1280), OrientationClass::Portrait);
        assert_eq!(OrientationClass::classify(1000, 1000), OrientationClass::Other);
    }

    #[test]
    fn test_tolerance_is_symmetric() {
        // 2.0 sits 0.222 above 16:9, 1.6 sits 0.178 below it
        assert_eq!(OrientationClass::classify(2000, 1000), OrientationClass::Landscape);
        assert_eq!(OrientationClass::classify(1600, 1000), OrientationClass::Landscape);
        // far below either target
        assert_eq!(OrientationClass::classify(100, 1000), OrientationClass::Other);
        // ultra-wide
        assert_eq!(OrientationClass::classify(2560, 1080), OrientationClass::Other);
    }

    #[test]
    fn test_zero_dimension_is_other() {
        assert_eq!(OrientationClass::classify(0, 1080), OrientationClass::Other);
        assert_eq!(OrientationClass::classify(1920, 0), OrientationClass::Other);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(OrientationClass::Landscape.prefix(), "landscape");
        assert_eq!(OrientationClass::Portrait.prefix(), "portrait");
        assert_eq!(OrientationClass::Other.to_string(), "other");
    }
}
