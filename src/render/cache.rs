//! Rendered pages kept by a render worker
//!
//! One cache lives inside each worker and dies with it, so a new document
//! always starts from an empty cache.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::request::RenderedPage;

/// Scale is kept to four decimals so auto-fit results for the same width
/// land on the same entry
fn slot(page: usize, scale: f32) -> (usize, u32) {
    (page, (scale * 10_000.0).round() as u32)
}

pub(super) struct PageCache {
    pages: LruCache<(usize, u32), Arc<RenderedPage>>,
}

impl PageCache {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            pages: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub(super) fn get(&mut self, page: usize, scale: f32) -> Option<Arc<RenderedPage>> {
        self.pages.get(&slot(page, scale)).cloned()
    }

    pub(super) fn insert(&mut self, rendered: RenderedPage) -> Arc<RenderedPage> {
        let rendered = Arc::new(rendered);
        self.pages
            .put(slot(rendered.page, rendered.scale), Arc::clone(&rendered));
        rendered
    }
}
