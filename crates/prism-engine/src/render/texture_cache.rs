use std::collections::HashMap;

use crate::device::GpuBackend;
use crate::scene::{TextureId, TextureImage};

/// GPU textures of one renderer, keyed by source image identity.
///
/// Two `TextureImage`s with identical pixels still get separate textures.
pub struct TextureCache<B: GpuBackend> {
    textures: HashMap<TextureId, B::Texture>,
}

impl<B: GpuBackend> Default for TextureCache<B> {
    fn default() -> Self {
        Self {
            textures: HashMap::new(),
        }
    }
}

impl<B: GpuBackend> TextureCache<B> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn contains(&self, image: &TextureImage) -> bool {
        self.textures.contains_key(&image.id())
    }

    /// Returns the texture for `image`, uploading it on first request.
    ///
    /// The source rows are flipped to the bottom-left origin before the
    /// first upload; a source flipped earlier (by another renderer) is
    /// uploaded as is.
    pub fn get_or_upload(&mut self, backend: &mut B, image: &TextureImage) -> &B::Texture {
        self.textures.entry(image.id()).or_insert_with(|| {
            if image.flip_for_upload() {
                log::debug!("flipped texture {:?} for upload", image.id());
            }
            log::debug!(
                "uploading texture {:?} ({}x{})",
                image.id(),
                image.width(),
                image.height()
            );
            backend.upload_texture(&image.pixels())
        })
    }

    pub fn release_all(&mut self, backend: &mut B) {
        for (_, texture) in self.textures.drain() {
            backend.delete_texture(texture);
        }
    }
}
