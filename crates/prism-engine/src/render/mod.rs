//! Scene rendering.
//!
//! A render walks the visible part of the scene in pre-order and encodes one
//! draw per drawable unit. GPU resources are resolved through per-renderer
//! caches and every GPU call goes through the current backend.
//!
//! Convention:
//! - camera matrices are column-major with clip-space depth in `[-1, 1]`
//! - texture coordinates use a bottom-left origin
//! - images handed to the host are top row first

mod encoder;
mod renderer;
mod texture_cache;

pub use encoder::{DrawEncoder, Encoded};
pub use renderer::{FrameStats, Painter, Renderer, RendererConfig};
pub use texture_cache::TextureCache;
