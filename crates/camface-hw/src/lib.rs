//! camface-hw: frame sources for the capture loop.
//!
//! Provides V4L2 camera access with RGB conversion, plus a still-image
//! source for running without a camera.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{ColorOrder, Frame};
pub use source::{FrameSource, StillSource};
