//! Scene model consumed by the renderer.
//!
//! The scene graph collaborator owns and mutates these types; the renderer
//! only reads them for the duration of one render call.
//!
//! Responsibilities:
//! - shape tree (parent / leaf) and drawable unit chains
//! - camera matrices and texture sources handed in by the host
//! - pre-order traversal that skips invisible subtrees

mod camera;
mod shape;
mod texture;
mod traverse;
mod unit;

pub use camera::CameraTransforms;
pub use shape::{Shape, ShapeKind};
pub use texture::{TextureId, TextureImage};
pub use traverse::traverse;
pub use unit::{Chain, Color, DrawableUnit, InvalidUnit};
