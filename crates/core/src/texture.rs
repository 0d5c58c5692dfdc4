//! Textures of the accelerated backend.
//!
//! Textures are modelled as owned image surfaces keyed by id. The store only
//! tracks ownership so that loading and releasing can be checked; uploading
//! to an actual GPU is left to the windowing layer.

use cairo::{Format, ImageSurface};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

#[derive(Default)]
pub struct TextureStore {
    textures: HashMap<TextureId, ImageSurface>,
    next_id: u64,
    released: u64,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a texture holding a copy of `surface`.
    pub fn upload(&mut self, surface: &ImageSurface) -> Result<TextureId, cairo::Error> {
        let copy = copy_surface(surface)?;
        self.next_id += 1;
        let id = TextureId(self.next_id);
        self.textures.insert(id, copy);
        Ok(id)
    }

    /// Create an empty texture of the given size.
    pub fn allocate(&mut self, width: i32, height: i32) -> Result<TextureId, cairo::Error> {
        let surface = ImageSurface::create(Format::ARgb32, width.max(1), height.max(1))?;
        self.next_id += 1;
        let id = TextureId(self.next_id);
        self.textures.insert(id, surface);
        Ok(id)
    }

    /// Replace the content of an existing texture.
    pub fn replace(&mut self, id: TextureId, surface: &ImageSurface) -> Result<(), cairo::Error> {
        let copy = copy_surface(surface)?;
        self.textures.insert(id, copy);
        Ok(())
    }

    pub fn get(&self, id: TextureId) -> Option<&ImageSurface> {
        self.textures.get(&id)
    }

    pub fn release(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            self.released += 1;
        }
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.textures.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Number of textures released so far.
    pub fn released_count(&self) -> u64 {
        self.released
    }
}

fn copy_surface(surface: &ImageSurface) -> Result<ImageSurface, cairo::Error> {
    let copy = ImageSurface::create(Format::ARgb32, surface.width().max(1), surface.height().max(1))?;
    let cr = cairo::Context::new(&copy)?;
    cr.set_source_surface(surface, 0.0, 0.0)?;
    cr.set_operator(cairo::Operator::Source);
    cr.paint()?;
    drop(cr);
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_and_release() {
        let mut store = TextureStore::new();
        let surface = ImageSurface::create(Format::ARgb32, 8, 8).unwrap();
        let a = store.upload(&surface).unwrap();
        let b = store.allocate(4, 4).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);

        store.release(a);
        store.release(a);
        assert!(!store.contains(a));
        assert!(store.contains(b));
        assert_eq!(store.released_count(), 1);
        assert_eq!(store.get(b).map(|s| s.width()), Some(4));
    }
}
