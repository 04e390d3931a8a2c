//! Viewport controller for the rendered graph

pub mod camera;

pub use camera::{
    max_pan, Bounds, Camera, CameraState, BASE_MAX_PAN, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM,
    SMOOTHING,
};
