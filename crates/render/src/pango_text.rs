//! Pango layout helpers
//!
//! Cairo's toy font API creates internal font caches that grow unboundedly.
//! Pango properly manages font resources and integrates with fontconfig, so
//! every text layer is laid out through here.

use pango::{FontDescription, Layout};
use pangocairo::functions::create_layout;
use std::cell::RefCell;
use std::collections::HashMap;

/// Cache for FontDescription objects to avoid repeated allocations
struct FontDescriptionCache {
    cache: HashMap<FontKey, FontDescription>,
    max_entries: usize,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct FontKey {
    family: String,
    size_pango: i32, // Size in Pango units (pixels * PANGO_SCALE)
}

impl FontDescriptionCache {
    fn new() -> Self {
        Self {
            cache: HashMap::new(),
            max_entries: 64,
        }
    }

    fn get_or_create(&mut self, family: &str, size: f64) -> FontDescription {
        let key = FontKey {
            family: family.to_string(),
            size_pango: (size * pango::SCALE as f64) as i32,
        };

        if let Some(desc) = self.cache.get(&key) {
            return desc.clone();
        }

        // Evict if full (simple eviction - just clear half)
        if self.cache.len() >= self.max_entries {
            let keys_to_remove: Vec<_> = self
                .cache
                .keys()
                .take(self.max_entries / 2)
                .cloned()
                .collect();
            for k in keys_to_remove {
                self.cache.remove(&k);
            }
        }

        let mut desc = FontDescription::new();
        desc.set_family(family);
        // Panel pixels, not points: the device has no meaningful DPI
        desc.set_absolute_size(key.size_pango as f64);

        self.cache.insert(key, desc.clone());
        desc
    }
}

thread_local! {
    static FONT_DESC_CACHE: RefCell<FontDescriptionCache> = RefCell::new(FontDescriptionCache::new());
}

/// Logical size of a laid out text, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextSize {
    pub width: f64,
    pub height: f64,
}

/// Create a layout for `text` with a cached font description
pub fn text_layout(cr: &cairo::Context, text: &str, family: &str, size: f64) -> Layout {
    let font_desc = FONT_DESC_CACHE.with(|cache| cache.borrow_mut().get_or_create(family, size));
    let layout = create_layout(cr);
    layout.set_font_description(Some(&font_desc));
    layout.set_text(text);
    layout
}

/// Logical extents of a layout
pub fn layout_size(layout: &Layout) -> TextSize {
    let (_ink, logical) = layout.extents();
    let scale = pango::SCALE as f64;
    TextSize {
        width: logical.width() as f64 / scale,
        height: logical.height() as f64 / scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_cache_reuses_and_evicts() {
        let mut cache = FontDescriptionCache::new();
        let a = cache.get_or_create("Sans", 24.0);
        let b = cache.get_or_create("Sans", 24.0);
        assert_eq!(a, b);
        assert_eq!(cache.cache.len(), 1);

        for i in 0..100 {
            cache.get_or_create("Sans", 8.0 + i as f64);
        }
        assert!(cache.cache.len() <= cache.max_entries);
    }
}
