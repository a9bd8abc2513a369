//! GPU device layer.
//!
//! This module is responsible for:
//! - the `GpuBackend` seam the renderer core draws through
//! - creating the wgpu Instance/Adapter/Device/Queue without a window
//! - owning offscreen color/depth targets and reading them back

mod backend;
mod gpu;
mod init;
mod pipeline;
mod readback;

#[cfg(test)]
mod recording;

pub use backend::{
    Compiled, DrawCall, GpuBackend, Origin, Primitives, SceneUniforms, VertexStream,
};
pub use gpu::{WgpuBackend, WgpuProgram, WgpuShader, WgpuTexture};
pub use init::GpuInit;

#[cfg(test)]
pub(crate) use recording::{DrawRecord, RecordedPrimitives, RecordingBackend};
