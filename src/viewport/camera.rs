//! Smoothed camera over the rendered graph
//!
//! The camera holds a current transform and a target transform. Input only
//! moves the target; [`Camera::update_smooth`] is called once per frame and
//! eases the current values toward it. Targets are clamped to a box that
//! grows as the camera zooms out, so a zoomed-out camera can roam further.

use crate::layout::{Position, PositionMap};
use serde::{Deserialize, Serialize};

/// Zoom after `reset`
pub const DEFAULT_ZOOM: f64 = 0.05;
pub const MIN_ZOOM: f64 = 0.01;
pub const MAX_ZOOM: f64 = 5.0;
/// Pan bound at zoom 1
pub const BASE_MAX_PAN: f64 = 1_000_000.0;
/// Fraction of the remaining distance covered per frame
pub const SMOOTHING: f64 = 0.1;

const SETTLE_DISTANCE: f64 = 0.01;
const SETTLE_ZOOM: f64 = 1e-5;

/// Camera transform, current and target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    pub target_x: f64,
    pub target_y: f64,
    pub target_zoom: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: DEFAULT_ZOOM,
            target_x: 0.0,
            target_y: 0.0,
            target_zoom: DEFAULT_ZOOM,
        }
    }
}

/// Axis-aligned box around a set of positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Position,
    pub max: Position,
}

impl Bounds {
    /// Bounds of all finite positions, `None` if there are none
    pub fn from_positions(positions: &PositionMap) -> Option<Self> {
        let mut finite = positions.values().filter(|p| p.is_finite());
        let first = *finite.next()?;
        Some(finite.fold(Bounds { min: first, max: first }, |b, p| Bounds {
            min: Position::new(b.min.x.min(p.x), b.min.y.min(p.y)),
            max: Position::new(b.max.x.max(p.x), b.max.y.max(p.y)),
        }))
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Pan limit for a zoom level
pub fn max_pan(zoom: f64) -> f64 {
    BASE_MAX_PAN / zoom
}

fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Per-frame camera controller
#[derive(Debug, Clone, Default)]
pub struct Camera {
    state: CameraState,
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Back to the origin at the default zoom, without easing
    pub fn reset(&mut self) {
        self.state = CameraState::default();
    }

    /// Move the target. `zoom` keeps the current target zoom when `None`.
    /// Non-finite components are ignored and keep their current target.
    pub fn set_target(&mut self, x: f64, y: f64, zoom: Option<f64>) {
        let zoom = clamp_zoom(
            zoom.filter(|z| z.is_finite())
                .unwrap_or(self.state.target_zoom),
        );
        let x = if x.is_finite() { x } else { self.state.target_x };
        let y = if y.is_finite() { y } else { self.state.target_y };
        let bound = max_pan(zoom);
        self.state.target_x = x.clamp(-bound, bound);
        self.state.target_y = y.clamp(-bound, bound);
        self.state.target_zoom = zoom;
    }

    /// Shift the target by a world-space delta
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let x = self.state.target_x + dx;
        let y = self.state.target_y + dy;
        self.set_target(x, y, None);
    }

    /// Change the target zoom additively. The pan target is re-clamped to the
    /// bound of the new zoom.
    pub fn zoom_by(&mut self, delta: f64) {
        let zoom = self.state.target_zoom + delta;
        self.set_target(self.state.target_x, self.state.target_y, Some(zoom));
    }

    /// Target a single point
    pub fn focus_on(&mut self, position: Position, zoom: Option<f64>) {
        self.set_target(position.x, position.y, zoom);
    }

    /// Target the center of `bounds` at the zoom that fits it, plus `padding`
    /// on each side, into a `width` x `height` viewport
    pub fn fit_bounds(&mut self, bounds: &Bounds, width: f64, height: f64, padding: f64) {
        let span_x = bounds.width() + 2.0 * padding;
        let span_y = bounds.height() + 2.0 * padding;
        let zoom = if span_x > 0.0 && span_y > 0.0 {
            (width / span_x).min(height / span_y)
        } else {
            self.state.target_zoom
        };
        let center = bounds.center();
        self.set_target(center.x, center.y, Some(zoom));
    }

    /// Advance one frame: ease current values toward the target. Values
    /// within the settle tolerance snap onto the target.
    pub fn update_smooth(&mut self) {
        let s = &mut self.state;
        s.x = ease(s.x, s.target_x, SETTLE_DISTANCE);
        s.y = ease(s.y, s.target_y, SETTLE_DISTANCE);
        s.zoom = ease(s.zoom, s.target_zoom, SETTLE_ZOOM);
    }

    pub fn is_panning(&self) -> bool {
        (self.state.target_x - self.state.x).abs() > SETTLE_DISTANCE
            || (self.state.target_y - self.state.y).abs() > SETTLE_DISTANCE
    }

    pub fn is_zooming(&self) -> bool {
        (self.state.target_zoom - self.state.zoom).abs() > SETTLE_ZOOM
    }

    /// Neither panning nor zooming
    pub fn is_settled(&self) -> bool {
        !self.is_panning() && !self.is_zooming()
    }

    /// World coordinates to screen pixels for a `width` x `height` viewport
    pub fn world_to_screen(&self, p: Position, width: f64, height: f64) -> Position {
        Position::new(
            (p.x - self.state.x) * self.state.zoom + width / 2.0,
            (p.y - self.state.y) * self.state.zoom + height / 2.0,
        )
    }

    /// Screen pixels back to world coordinates
    pub fn screen_to_world(&self, p: Position, width: f64, height: f64) -> Position {
        Position::new(
            (p.x - width / 2.0) / self.state.zoom + self.state.x,
            (p.y - height / 2.0) / self.state.zoom + self.state.y,
        )
    }
}

fn ease(current: f64, target: f64, tolerance: f64) -> f64 {
    let next = current + (target - current) * SMOOTHING;
    if (target - next).abs() <= tolerance {
        target
    } else {
        next
    }
}
