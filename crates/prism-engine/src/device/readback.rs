//! Texture readback from GPU to CPU.

use std::sync::mpsc::channel;

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;

const BYTES_PER_PIXEL: u32 = 4;

/// Parameters for texture readback.
pub(super) struct ReadbackParams<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    /// Single-sampled RGBA8 texture with `COPY_SRC` usage.
    pub texture: &'a wgpu::Texture,
    pub width: u32,
    pub height: u32,
}

/// Copies `texture` into a mapped staging buffer and unpads it into an image.
///
/// Blocks until the GPU has finished the copy.
pub(super) fn readback_texture(params: ReadbackParams<'_>) -> Result<RgbaImage> {
    let row_bytes = params.width * BYTES_PER_PIXEL;
    let padded_bpr = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let buffer_size = u64::from(padded_bpr) * u64::from(params.height);

    let staging = params.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("prism readback staging"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = params
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("prism readback encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: params.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(params.height),
            },
        },
        wgpu::Extent3d {
            width: params.width,
            height: params.height,
            depth_or_array_layers: 1,
        },
    );
    params.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        drop(sender.send(res));
    });
    params
        .device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("failed waiting for readback copy")?;
    receiver
        .recv()
        .map_err(|_| anyhow!("readback mapping callback dropped"))?
        .context("failed to map readback buffer")?;

    let mapped = slice.get_mapped_range();
    let mut data = Vec::with_capacity((row_bytes * params.height) as usize);
    for row in mapped.chunks_exact(padded_bpr as usize) {
        data.extend_from_slice(&row[..row_bytes as usize]);
    }
    drop(mapped);
    staging.unmap();

    RgbaImage::from_raw(params.width, params.height, data)
        .context("readback produced a buffer of unexpected size")
}
