use std::cell::{Cell, Ref, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use image::RgbaImage;

/// Opaque identity of a [`TextureImage`].
///
/// GPU textures are cached by this identity, never by pixel content.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureId(u64);

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Decoded RGBA8 image backing a texture.
///
/// Pixels are stored top row first. Texture coordinates use a bottom-left
/// origin, so the rows are flipped once before the first upload; the flag
/// lives here so a source shared between renderers is never flipped twice.
#[derive(Debug)]
pub struct TextureImage {
    id: TextureId,
    pixels: RefCell<RgbaImage>,
    flipped: Cell<bool>,
}

impl TextureImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            id: TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)),
            pixels: RefCell::new(pixels),
            flipped: Cell::new(false),
        }
    }

    /// Wraps a raw RGBA8 buffer (`width * height * 4` bytes).
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let len = pixels.len();
        let image = RgbaImage::from_raw(width, height, pixels).with_context(|| {
            format!("pixel buffer of {len} bytes does not match a {width}x{height} RGBA8 image")
        })?;
        Ok(Self::new(image))
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.borrow().width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.borrow().height()
    }

    /// Whether the rows have already been flipped for upload.
    #[inline]
    pub fn is_flipped(&self) -> bool {
        self.flipped.get()
    }

    /// Current pixel rows (flipped if [`is_flipped`](Self::is_flipped)).
    pub fn pixels(&self) -> Ref<'_, RgbaImage> {
        self.pixels.borrow()
    }

    /// Flips the rows to the bottom-left origin unless already done.
    ///
    /// Returns `true` if this call performed the flip.
    pub(crate) fn flip_for_upload(&self) -> bool {
        if self.flipped.get() {
            return false;
        }
        image::imageops::flip_vertical_in_place(&mut *self.pixels.borrow_mut());
        self.flipped.set(true);
        true
    }
}
