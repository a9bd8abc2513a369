//! Offscreen drawing surface and framebuffer readback.

mod offscreen;
mod readback;

pub use offscreen::{Current, OffscreenSurface, SurfaceProvider};
pub use readback::ReadbackCache;
