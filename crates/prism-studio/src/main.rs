use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use image::{Rgba, RgbaImage};
use winit::dpi::LogicalSize;

use prism_engine::logging::{LoggingConfig, init_logging};
use prism_engine::scene::{CameraTransforms, Color, DrawableUnit, Shape, TextureImage};
use prism_engine::{Painter, Renderer, RendererConfig};

/// Keeps the last composited frame so it can be written to disk.
#[derive(Default)]
struct PngPainter {
    frame: Option<RgbaImage>,
}

impl Painter for PngPainter {
    fn draw_image(&mut self, image: &RgbaImage, logical_width: f64, logical_height: f64) {
        log::info!(
            "compositing {}x{} frame at {logical_width}x{logical_height} logical px",
            image.width(),
            image.height()
        );
        self.frame = Some(image.clone());
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("prism.png"));

    let config = RendererConfig {
        device_scale: 2.0,
        logical_size: LogicalSize::new(400.0, 300.0),
        ..RendererConfig::default()
    };
    let mut renderer = Renderer::with_wgpu(config)?;

    let scene = demo_scene();
    // GL clip depth; the vertex stage remaps it to wgpu's [0, 1].
    let camera = CameraTransforms::new(
        Mat4::perspective_rh_gl(45f32.to_radians(), 400.0 / 300.0, 0.1, 100.0).to_cols_array(),
        Mat4::look_at_rh(Vec3::new(4.0, 3.0, 6.0), Vec3::new(0.5, 0.0, 0.0), Vec3::Y)
            .to_cols_array(),
    );

    let mut painter = PngPainter::default();
    let stats = renderer.render_and_paint(&camera, &scene, &mut painter)?;
    log::info!(
        "rendered {} units ({} draws, {} indexed, {} skipped)",
        stats.units,
        stats.draws,
        stats.indexed_draws,
        stats.skipped
    );

    let frame = painter.frame.context("renderer produced no frame")?;
    frame
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("wrote {}", output.display());

    renderer.dispose();
    Ok(())
}

// ── scene ─────────────────────────────────────────────────────────────────

fn demo_scene() -> Shape {
    let checker = Rc::new(TextureImage::new(checkerboard(64, 8)));

    Shape::parent(vec![
        Shape::leaf(cube()),
        Shape::parent(vec![Shape::leaf(quad(checker))]),
        // Never drawn: the whole subtree is hidden.
        Shape::parent(vec![Shape::leaf(
            DrawableUnit::new(vec![-5.0, -5.0, 0.0, 5.0, -5.0, 0.0, 0.0, 5.0, 0.0])
                .with_color(Color::RED),
        )])
        .hidden(),
    ])
}

/// Unit cube with one color per corner, indexed, CCW outward faces.
fn cube() -> DrawableUnit {
    #[rustfmt::skip]
    let positions = vec![
        -1.0, -1.0, -1.0,   1.0, -1.0, -1.0,   1.0,  1.0, -1.0,  -1.0,  1.0, -1.0,
        -1.0, -1.0,  1.0,   1.0, -1.0,  1.0,   1.0,  1.0,  1.0,  -1.0,  1.0,  1.0,
    ];
    #[rustfmt::skip]
    let colors = vec![
        0.0, 0.0, 0.0,   1.0, 0.0, 0.0,   1.0, 1.0, 0.0,   0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,   1.0, 0.0, 1.0,   1.0, 1.0, 1.0,   0.0, 1.0, 1.0,
    ];
    #[rustfmt::skip]
    let indices = vec![
        4, 5, 6,  4, 6, 7, // +z
        1, 0, 3,  1, 3, 2, // -z
        5, 1, 2,  5, 2, 6, // +x
        0, 4, 7,  0, 7, 3, // -x
        7, 6, 2,  7, 2, 3, // +y
        0, 1, 5,  0, 5, 4, // -y
    ];
    DrawableUnit::new(positions)
        .with_colors(colors)
        .with_indices(indices)
}

/// Double-sided textured square standing right of the cube.
fn quad(texture: Rc<TextureImage>) -> DrawableUnit {
    #[rustfmt::skip]
    let positions = vec![
        1.5, -1.0, 0.0,   3.5, -1.0, 0.0,   3.5, 1.0, 0.0,
        1.5, -1.0, 0.0,   3.5,  1.0, 0.0,   1.5, 1.0, 0.0,
    ];
    #[rustfmt::skip]
    let tex_coords = vec![
        0.0, 0.0,   1.0, 0.0,   1.0, 1.0,
        0.0, 0.0,   1.0, 1.0,   0.0, 1.0,
    ];
    DrawableUnit::new(positions)
        .with_tex_coords(tex_coords)
        .with_color(Color::WHITE)
        .with_texture(texture)
        .with_double_sided(true)
}

fn checkerboard(size: u32, cells: u32) -> RgbaImage {
    let cell = (size / cells).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgba([240, 240, 240, 255])
        } else {
            Rgba([40, 90, 200, 255])
        }
    })
}
