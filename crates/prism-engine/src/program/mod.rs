//! Program variants and the per-renderer program cache.
//!
//! Units are mapped to one of a closed set of variants by attribute
//! presence. Each variant owns one vertex stage; all variants share the
//! general fragment stage. Programs are built lazily and cached per variant.

mod cache;
mod diagnostic;
mod library;
mod variant;

pub use cache::{AttributeSlots, CompiledProgram, ProgramCache};
pub use diagnostic::ProgramDiagnostic;
pub use library::{ShaderLibrary, ShaderStage};
pub use variant::{
    COLOR_ATTRIBUTE, POSITION_ATTRIBUTE, TEX_COORD_ATTRIBUTE, VariantKey, select_variant,
};
