//! Where photos leave the camera and where they come to rest.

use std::ops::RangeInclusive;

use rand::Rng;
use shared::domain::{PhotoPatch, Viewport};

pub const MAX_ROTATION_DEGREES: f64 = 10.0;

const MOBILE_EJECT_CENTER_OFFSET: f64 = 120.0;
const MOBILE_EJECT_BOTTOM_OFFSET: f64 = 380.0;
const DESKTOP_EJECT_X: f64 = 220.0;
const DESKTOP_EJECT_BOTTOM_OFFSET: f64 = 400.0;

const MOBILE_SCATTER_JITTER: f64 = 20.0;
const MOBILE_SCATTER_TOP: f64 = 80.0;
const MOBILE_SCATTER_BOTTOM_OFFSET: f64 = 480.0;
const DESKTOP_SCATTER_LEFT: f64 = 400.0;
const DESKTOP_SCATTER_RIGHT_OFFSET: f64 = 300.0;
const DESKTOP_SCATTER_TOP: f64 = 100.0;
const DESKTOP_SCATTER_BOTTOM_OFFSET: f64 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

impl Placement {
    pub fn patch(&self) -> PhotoPatch {
        PhotoPatch::placement(self.x, self.y, self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterBounds {
    pub x: RangeInclusive<f64>,
    pub y: RangeInclusive<f64>,
}

/// Print-slot position a fresh photo starts from.
pub fn ejection_position(viewport: Viewport) -> (f64, f64) {
    if viewport.is_mobile() {
        (
            viewport.width / 2.0 - MOBILE_EJECT_CENTER_OFFSET,
            viewport.height - MOBILE_EJECT_BOTTOM_OFFSET,
        )
    } else {
        (
            DESKTOP_EJECT_X,
            viewport.height - DESKTOP_EJECT_BOTTOM_OFFSET,
        )
    }
}

// Windows too small for the region collapse it onto its lower edge. A
// non-finite lower edge falls back to the origin.
fn span(low: f64, high: f64) -> RangeInclusive<f64> {
    let low = if low.is_finite() { low } else { 0.0 };
    if high.is_finite() && high >= low {
        low..=high
    } else {
        low..=low
    }
}

pub fn scatter_bounds(viewport: Viewport) -> ScatterBounds {
    if viewport.is_mobile() {
        let center = viewport.width / 2.0 - MOBILE_EJECT_CENTER_OFFSET;
        ScatterBounds {
            x: span(center - MOBILE_SCATTER_JITTER, center + MOBILE_SCATTER_JITTER),
            y: span(
                MOBILE_SCATTER_TOP,
                viewport.height - MOBILE_SCATTER_BOTTOM_OFFSET,
            ),
        }
    } else {
        ScatterBounds {
            x: span(
                DESKTOP_SCATTER_LEFT,
                viewport.width - DESKTOP_SCATTER_RIGHT_OFFSET,
            ),
            y: span(
                DESKTOP_SCATTER_TOP,
                viewport.height - DESKTOP_SCATTER_BOTTOM_OFFSET,
            ),
        }
    }
}

pub fn scatter_placement<R: Rng>(viewport: Viewport, rng: &mut R) -> Placement {
    let bounds = scatter_bounds(viewport);
    Placement {
        x: rng.random_range(bounds.x),
        y: rng.random_range(bounds.y),
        rotation: rng.random_range(-MAX_ROTATION_DEGREES..=MAX_ROTATION_DEGREES),
    }
}

#[cfg(test)]
#[path = "tests/layout_tests.rs"]
mod tests;
