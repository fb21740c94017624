//! Coordinate scaling between the agent's view of the screen and the display.
//!
//! Vision models do best at or below XGA/WXGA-class resolutions, so when the
//! display is larger the agent is shown a downscaled screen. The target is the
//! first preset whose aspect ratio matches the display; coordinates coming
//! from the API are scaled up to display pixels, and coordinates read back
//! from the display are scaled down again.

use super::error::{ComputerError, ComputerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed difference between aspect ratios; real panels are rarely exact.
const ASPECT_RATIO_TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named scaling targets, checked in order.
pub const SCALING_TARGETS: &[(&str, Resolution)] = &[
    ("XGA", Resolution::new(1024, 768)),    // 4:3
    ("WXGA", Resolution::new(1280, 800)),   // 16:10
    ("FWXGA", Resolution::new(1366, 768)),  // ~16:9
    ("RETINA_SCALED", Resolution::new(1728, 1117)), // 3456x2234 Retina halved
];

/// Which coordinate space a pair of coordinates comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingSource {
    /// Agent space, as sent by the LLM.
    Api,
    /// Display pixels, as reported by the automation backend.
    Computer,
}

/// Display geometry a tool instance works against. Built once from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingContext {
    pub display: Resolution,
    pub display_num: Option<u32>,
    pub scaling_enabled: bool,
}

impl ScalingContext {
    pub fn new(display: Resolution, display_num: Option<u32>, scaling_enabled: bool) -> Self {
        Self {
            display,
            display_num,
            scaling_enabled,
        }
    }

    /// The resolution the agent is shown, or `None` when coordinates pass
    /// through unchanged.
    pub fn target(&self) -> Option<Resolution> {
        if !self.scaling_enabled {
            return None;
        }
        let ratio = self.display.aspect_ratio();
        SCALING_TARGETS
            .iter()
            .map(|(_, target)| *target)
            .find(|target| (target.aspect_ratio() - ratio).abs() < ASPECT_RATIO_TOLERANCE)
            .filter(|target| target.width < self.display.width)
    }

    /// Name of the active preset, for logs and `deskpilot info`.
    pub fn target_name(&self) -> Option<&'static str> {
        let target = self.target()?;
        SCALING_TARGETS
            .iter()
            .find(|(_, r)| *r == target)
            .map(|(name, _)| *name)
    }

    /// Map `(x, y)` from `source` space into the other space.
    ///
    /// API coordinates must lie on the screen advertised to the agent
    /// (`0..width`, `0..height` of [`Self::api_resolution`]).
    pub fn scale(&self, source: ScalingSource, x: u32, y: u32) -> ComputerResult<(u32, u32)> {
        let Some(target) = self.target() else {
            return Ok((x, y));
        };

        let x_factor = f64::from(target.width) / f64::from(self.display.width);
        let y_factor = f64::from(target.height) / f64::from(self.display.height);

        match source {
            ScalingSource::Api => {
                if x >= target.width || y >= target.height {
                    return Err(ComputerError::OutOfBounds {
                        x,
                        y,
                        width: target.width,
                        height: target.height,
                    });
                }
                Ok((
                    round_px(f64::from(x) / x_factor),
                    round_px(f64::from(y) / y_factor),
                ))
            }
            ScalingSource::Computer => Ok((
                round_px(f64::from(x) * x_factor),
                round_px(f64::from(y) * y_factor),
            )),
        }
    }

    /// Screen size advertised to the agent.
    pub fn api_resolution(&self) -> Resolution {
        self.target().unwrap_or(self.display)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_px(value: f64) -> u32 {
    value.round().max(0.0) as u32
}
