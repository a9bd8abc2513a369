//! Prism engine crate.
//!
//! Renders a retained 3D scene graph offscreen and hands the result back as
//! a CPU image for compositing by a 2D host.

pub mod device;
pub mod logging;
pub mod program;
pub mod render;
pub mod scene;
pub mod surface;

pub use render::{FrameStats, Painter, Renderer, RendererConfig};
