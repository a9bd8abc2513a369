use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::program::{ShaderStage, VariantKey};

use super::GpuInit;
use super::backend::{Compiled, DrawCall, GpuBackend, Origin, Primitives};
use super::pipeline::{
    COLOR_FORMAT, DEPTH_FORMAT, PipelineParams, RenderTargets, create_pipeline,
    scene_bind_group_layout,
};
use super::readback::{ReadbackParams, readback_texture};

/// Compiled shader stage; `None` when the source did not validate.
pub struct WgpuShader {
    module: Option<wgpu::ShaderModule>,
}

/// Linked program: one pipeline per cull mode.
///
/// Both pipelines are `None` when a stage failed to compile; draws with such
/// a program are skipped.
pub struct WgpuProgram {
    variant: VariantKey,
    culled: Option<wgpu::RenderPipeline>,
    double_sided: Option<wgpu::RenderPipeline>,
}

/// Uploaded texture.
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Owns the wgpu device and the offscreen render targets.
///
/// This type is the low-level rendering context:
/// - owns the color (optionally multisampled) and depth targets
/// - records one render pass per draw into the frame encoder
/// - reads the resolved color target back to the CPU
///
/// Uncaptured device errors are logged instead of panicking.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Current framebuffer size in device pixels.
    size: PhysicalSize<u32>,
    /// Largest target edge the device accepts.
    max_dimension: u32,
    sample_count: u32,
    targets: RenderTargets,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    /// Bound for programs that do not sample a texture.
    white: WgpuTexture,

    /// Open frame, if any.
    encoder: Option<wgpu::CommandEncoder>,
    /// Clear still owed to the first pass of the open frame.
    pending_clear: Option<wgpu::Color>,
    cull_back_faces: bool,
}

impl WgpuBackend {
    /// Creates a headless GPU context with targets of `size` device pixels.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(size: PhysicalSize<u32>, init: &GpuInit) -> Result<Self> {
        anyhow::ensure!(init.sample_count >= 1, "sample count must be at least 1");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!("using adapter \"{}\" ({:?})", info.name, info.backend);

        for format in [COLOR_FORMAT, DEPTH_FORMAT] {
            let features = adapter.get_texture_format_features(format);
            anyhow::ensure!(
                features.flags.sample_count_supported(init.sample_count),
                "{format:?} does not support {} samples on this adapter",
                init.sample_count
            );
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("prism-engine device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;
        device.on_uncaptured_error(Arc::new(|error| {
            log::error!("uncaptured wgpu error: {error}");
        }));

        let max_dimension = device.limits().max_texture_dimension_2d;
        check_target_size(size, max_dimension)?;

        let bind_group_layout = scene_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("prism pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("prism texture sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let white = create_texture(
            &device,
            &queue,
            &RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
            "prism white texture",
        );

        let targets = RenderTargets::new(&device, size.width, size.height, init.sample_count);
        log::debug!(
            "offscreen targets created at {}x{} ({} samples)",
            size.width,
            size.height,
            init.sample_count
        );

        Ok(Self {
            device,
            queue,
            size,
            max_dimension,
            sample_count: init.sample_count,
            targets,
            bind_group_layout,
            pipeline_layout,
            sampler,
            white,
            encoder: None,
            pending_clear: None,
            // Back faces are culled unless a unit asks otherwise.
            cull_back_faces: true,
        })
    }

    fn bind_group(&self, uniforms: &wgpu::Buffer, texture: &WgpuTexture) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prism draw bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

impl GpuBackend for WgpuBackend {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Texture = WgpuTexture;

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let size = clamp_target_size(size, self.max_dimension);
        if size == self.size {
            return;
        }
        self.size = size;
        self.targets = RenderTargets::new(&self.device, size.width, size.height, self.sample_count);
        log::debug!("offscreen targets resized to {}x{}", size.width, size.height);
    }

    fn framebuffer_origin(&self) -> Origin {
        Origin::TopLeft
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        variant: VariantKey,
        source: &str,
    ) -> Compiled<WgpuShader> {
        if let Err(log) = validate_wgsl(source) {
            return Compiled::failed(WgpuShader { module: None }, log);
        }

        let label = format!("prism {} {} shader", variant.label(), stage.label());
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
        });
        Compiled::ok(WgpuShader {
            module: Some(module),
        })
    }

    fn link_program(
        &mut self,
        variant: VariantKey,
        vertex: &WgpuShader,
        fragment: &WgpuShader,
    ) -> Compiled<WgpuProgram> {
        let (Some(vertex), Some(fragment)) = (&vertex.module, &fragment.module) else {
            return Compiled::failed(
                WgpuProgram {
                    variant,
                    culled: None,
                    double_sided: None,
                },
                "cannot link: a shader stage failed to compile",
            );
        };

        let params = PipelineParams {
            device: &self.device,
            layout: &self.pipeline_layout,
            variant,
            vertex,
            fragment,
            sample_count: self.sample_count,
        };

        Compiled::ok(WgpuProgram {
            variant,
            culled: Some(create_pipeline(&params, Some(wgpu::Face::Back))),
            double_sided: Some(create_pipeline(&params, None)),
        })
    }

    fn attribute_location(&self, program: &WgpuProgram, name: &str) -> Option<u32> {
        program.variant.attribute_location(name)
    }

    fn delete_program(
        &mut self,
        program: WgpuProgram,
        _vertex: &WgpuShader,
        _fragment: &WgpuShader,
    ) {
        // Pipelines hold their own references to the modules; dropping
        // releases them.
        drop(program);
    }

    fn delete_shader(&mut self, shader: WgpuShader) {
        drop(shader);
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> WgpuTexture {
        create_texture(&self.device, &self.queue, image, "prism scene texture")
    }

    fn delete_texture(&mut self, texture: WgpuTexture) {
        texture.texture.destroy();
    }

    fn begin_frame(&mut self, clear: [f64; 4]) {
        if self.encoder.is_some() {
            log::debug!("begin_frame with an open frame; previous work discarded");
        }
        self.encoder = Some(self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor {
                label: Some("prism frame encoder"),
            },
        ));
        self.pending_clear = Some(wgpu::Color {
            r: clear[0],
            g: clear[1],
            b: clear[2],
            a: clear[3],
        });
    }

    fn cull_back_faces(&self) -> bool {
        self.cull_back_faces
    }

    fn set_cull_back_faces(&mut self, enabled: bool) {
        self.cull_back_faces = enabled;
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) {
        let program = call.program;
        let pipeline = if self.cull_back_faces {
            program.culled.as_ref()
        } else {
            program.double_sided.as_ref()
        };
        let Some(pipeline) = pipeline else {
            log::debug!("skipping draw: program {} is not linked", program.variant.label());
            return;
        };

        // Every location the vertex stage declares needs a stream.
        let locations = program.variant.vertex_locations();
        let mut slots: Vec<Option<&[f32]>> = vec![None; locations.len()];
        for stream in call.streams {
            if let Some(slot) = locations.iter().position(|&l| l == stream.location) {
                slots[slot] = Some(stream.data);
            }
        }
        let Some(slots) = slots.into_iter().collect::<Option<Vec<_>>>() else {
            log::debug!("skipping draw: missing vertex stream for {}", program.variant.label());
            return;
        };

        let uniforms = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("prism scene ubo"),
            contents: bytemuck::bytes_of(&call.uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.bind_group(&uniforms, call.texture.unwrap_or(&self.white));

        let vertex_buffers: Vec<wgpu::Buffer> = slots
            .iter()
            .map(|data| {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("prism vertex stream"),
                    contents: bytemuck::cast_slice(data),
                    usage: wgpu::BufferUsages::VERTEX,
                })
            })
            .collect();

        let index_buffer = match call.primitives {
            Primitives::Indexed(indices) => Some((
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("prism index buffer"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                indices.len() as u32,
            )),
            Primitives::Arrays { .. } => None,
        };

        let Some(encoder) = self.encoder.as_mut() else {
            log::debug!("skipping draw outside of a frame");
            return;
        };

        let (color_load, depth_load) = match self.pending_clear.take() {
            Some(color) => (wgpu::LoadOp::Clear(color), wgpu::LoadOp::Clear(1.0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };
        let (view, resolve_target) = self.targets.attachment();

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("prism draw pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_viewport(
            0.0,
            0.0,
            self.size.width.max(1) as f32,
            self.size.height.max(1) as f32,
            0.0,
            1.0,
        );
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        for (slot, buffer) in vertex_buffers.iter().enumerate() {
            rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }

        match (&index_buffer, call.primitives) {
            (Some((buffer, count)), _) => {
                rpass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..*count, 0, 0..1);
            }
            (None, Primitives::Arrays { vertex_count }) => rpass.draw(0..vertex_count, 0..1),
            (None, Primitives::Indexed(_)) => {}
        }
    }

    fn end_frame(&mut self) {
        let Some(mut encoder) = self.encoder.take() else {
            return;
        };

        // A frame without draws still owes its clear.
        if let Some(color) = self.pending_clear.take() {
            let (view, resolve_target) = self.targets.attachment();
            drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("prism clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            }));
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_pixels(&mut self) -> Result<RgbaImage> {
        if self.encoder.is_some() {
            self.end_frame();
        }
        readback_texture(ReadbackParams {
            device: &self.device,
            queue: &self.queue,
            texture: &self.targets.color,
            width: self.size.width.max(1),
            height: self.size.height.max(1),
        })
    }
}

/// Fails if either edge of `size` exceeds `max_dimension`.
fn check_target_size(size: PhysicalSize<u32>, max_dimension: u32) -> Result<()> {
    anyhow::ensure!(
        size.width <= max_dimension && size.height <= max_dimension,
        "{}x{} exceeds the device limit of {max_dimension} px per edge",
        size.width,
        size.height
    );
    Ok(())
}

/// Clamps each edge of `size` to `max_dimension`.
fn clamp_target_size(size: PhysicalSize<u32>, max_dimension: u32) -> PhysicalSize<u32> {
    let clamped = PhysicalSize::new(size.width.min(max_dimension), size.height.min(max_dimension));
    if clamped != size {
        log::warn!(
            "{}x{} exceeds the device limit of {max_dimension} px per edge; using {}x{}",
            size.width,
            size.height,
            clamped.width,
            clamped.height
        );
    }
    clamped
}

/// Parses and validates WGSL up front so a bad source becomes a
/// diagnostic instead of a device error.
fn validate_wgsl(source: &str) -> Result<(), String> {
    use wgpu::naga;

    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.into_inner().to_string())?;
    Ok(())
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &RgbaImage,
    label: &str,
) -> WgpuTexture {
    let (width, height) = (image.width().max(1), image.height().max(1));
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    if image.width() > 0 && image.height() > 0 {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    WgpuTexture { texture, view }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_within_limit_is_accepted() {
        assert!(check_target_size(PhysicalSize::new(8192, 1), 8192).is_ok());
    }

    #[test]
    fn oversized_target_is_rejected() {
        let err = check_target_size(PhysicalSize::new(10_000, 10_000), 8192).unwrap_err();
        assert!(err.to_string().contains("8192"));
    }

    #[test]
    fn resize_clamps_each_edge() {
        assert_eq!(
            clamp_target_size(PhysicalSize::new(10_000, 600), 8192),
            PhysicalSize::new(8192, 600)
        );
        assert_eq!(
            clamp_target_size(PhysicalSize::new(640, 480), 8192),
            PhysicalSize::new(640, 480)
        );
    }

    #[test]
    fn broken_wgsl_is_reported() {
        assert!(validate_wgsl("fn broken(").is_err());
        assert!(validate_wgsl("@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }").is_ok());
    }
}
