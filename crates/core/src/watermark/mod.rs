//! Watermark configuration and overlay-page synthesis.
//!
//! The watermark pipeline is: load the configured image, scale/rotate/fade
//! it ([`image_ops`]), then synthesize a one-page PDF of the target page's
//! dimensions with the processed image positioned on it ([`pdf_builder`]).
//! The overlay itself is composed by [`crate::filter::pdf`].

pub mod image_ops;
pub mod pdf_builder;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::RptError;

/// Where the watermark lands on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    /// Single centered image; the overlay step repeats it on every page.
    Repeat,
    /// A regular grid filling the whole page.
    Tiling,
}

impl FromStr for Position {
    type Err = RptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "center" => Ok(Position::Center),
            "topleft" => Ok(Position::TopLeft),
            "topcenter" => Ok(Position::TopCenter),
            "topright" => Ok(Position::TopRight),
            "middleleft" => Ok(Position::MiddleLeft),
            "middleright" => Ok(Position::MiddleRight),
            "bottomleft" => Ok(Position::BottomLeft),
            "bottomcenter" => Ok(Position::BottomCenter),
            "bottomright" => Ok(Position::BottomRight),
            "repeat" => Ok(Position::Repeat),
            "tiling" => Ok(Position::Tiling),
            other => Err(RptError::InvalidArgs(format!(
                "unknown watermark position '{other}'"
            ))),
        }
    }
}

/// Watermark settings with clamped setters.
///
/// The default-constructed config has no image path and therefore requests
/// no watermark.
#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    image_path: Option<PathBuf>,
    position: Position,
    rotation_degrees: i32,
    opacity_percent: i32,
    scale_factor: f64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        WatermarkConfig {
            image_path: None,
            position: Position::Center,
            rotation_degrees: 0,
            opacity_percent: 30,
            scale_factor: 1.0,
        }
    }
}

impl WatermarkConfig {
    pub fn set_image_path(&mut self, path: impl Into<PathBuf>) {
        self.image_path = Some(path.into());
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Clamped to [-180, 180] degrees.
    pub fn set_rotation(&mut self, degrees: i32) {
        self.rotation_degrees = degrees.clamp(-180, 180);
    }

    /// Clamped to [0, 100] percent.
    pub fn set_opacity(&mut self, percent: i32) {
        self.opacity_percent = percent.clamp(0, 100);
    }

    /// Clamped to [0.5, 2.0]; non-finite values are ignored.
    pub fn set_scale(&mut self, factor: f64) {
        if factor.is_finite() {
            self.scale_factor = factor.clamp(0.5, 2.0);
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn rotation_degrees(&self) -> i32 {
        self.rotation_degrees
    }

    pub fn opacity_percent(&self) -> i32 {
        self.opacity_percent
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Whether a watermark was requested at all.
    pub fn is_enabled(&self) -> bool {
        self.image_path.is_some()
    }
}
