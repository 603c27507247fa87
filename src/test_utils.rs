//! Fakes and builders shared by unit and integration tests

pub mod test_helpers {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use image::{ImageFormat, Rgba, RgbaImage};

    use crate::data::{DataAccess, DataError, Entity, Filter, MemoryStore, Order, Record, RecordId};
    use crate::error::RasterFault;
    use crate::events::{InputEvent, PointerEvent};
    use crate::render::{DocumentHandle, PageHandle, PageSize, Rasterizer, check_page};

    /// Solid fill used by [`FakeRasterizer`] for a 1-based page
    #[must_use]
    pub fn page_color(page: usize) -> Rgba<u8> {
        let n = (page % 251) as u8;
        Rgba([n.wrapping_mul(40), 255 - n.wrapping_mul(20), n.wrapping_mul(90), 255])
    }

    /// Rasterizer that paints every page a distinct solid color
    #[derive(Clone, Debug)]
    pub struct FakeRasterizer {
        pages: usize,
        size: PageSize,
        latency: HashMap<usize, Duration>,
        open_failure: Option<String>,
        opened: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    impl FakeRasterizer {
        /// `pages` pages of 800x1000
        #[must_use]
        pub fn new(pages: usize) -> Self {
            Self {
                pages,
                size: PageSize::new(800.0, 1000.0),
                latency: HashMap::new(),
                open_failure: None,
                opened: Arc::new(AtomicUsize::new(0)),
                destroyed: Arc::new(AtomicUsize::new(0)),
            }
        }

        #[must_use]
        pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
            self.size = PageSize::new(width, height);
            self
        }

        /// Make rendering `page` take at least `delay`
        #[must_use]
        pub fn with_latency(mut self, page: usize, delay: Duration) -> Self {
            self.latency.insert(page, delay);
            self
        }

        /// Make every `open` fail with an engine error
        #[must_use]
        pub fn failing_open(mut self, reason: &str) -> Self {
            self.open_failure = Some(reason.to_string());
            self
        }

        /// Handles opened so far, across all clones
        #[must_use]
        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        /// Handles destroyed so far, across all clones
        #[must_use]
        pub fn destroyed(&self) -> usize {
            self.destroyed.load(Ordering::SeqCst)
        }
    }

    impl Rasterizer for FakeRasterizer {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn open(&self, _bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RasterFault> {
            if let Some(reason) = &self.open_failure {
                return Err(RasterFault::engine(reason.clone()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeDocument {
                pages: self.pages,
                size: self.size,
                latency: self.latency.clone(),
                alive: true,
                destroyed: self.destroyed.clone(),
            }))
        }
    }

    struct FakeDocument {
        pages: usize,
        size: PageSize,
        latency: HashMap<usize, Duration>,
        alive: bool,
        destroyed: Arc<AtomicUsize>,
    }

    impl DocumentHandle for FakeDocument {
        fn page_count(&self) -> usize {
            if self.alive { self.pages } else { 0 }
        }

        fn page(&self, number: usize) -> Result<Box<dyn PageHandle + '_>, RasterFault> {
            if !self.alive {
                return Err(RasterFault::Destroyed);
            }
            check_page(number, self.pages)?;
            Ok(Box::new(FakePage {
                number,
                size: self.size,
                latency: self.latency.get(&number).copied(),
            }))
        }

        fn destroy(&mut self) {
            if self.alive {
                self.alive = false;
                self.destroyed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct FakePage {
        number: usize,
        size: PageSize,
        latency: Option<Duration>,
    }

    impl PageHandle for FakePage {
        fn intrinsic_size(&self) -> PageSize {
            self.size
        }

        fn render(&self, scale: f32) -> Result<RgbaImage, RasterFault> {
            if let Some(delay) = self.latency {
                std::thread::sleep(delay);
            }
            let (width, height) = self.size.scaled(scale);
            Ok(RgbaImage::from_pixel(width, height, page_color(self.number)))
        }
    }

    /// PNG bytes of a solid image
    #[must_use]
    pub fn png_bytes(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, color);
        let mut out = Cursor::new(Vec::new());
        if img.write_to(&mut out, ImageFormat::Png).is_err() {
            return Vec::new();
        }
        out.into_inner()
    }

    /// Memory store whose writes can be made to fail on demand
    #[derive(Debug, Default)]
    pub struct FlakyStore {
        pub inner: MemoryStore,
        pub fail_creates: bool,
        pub fail_deletes: bool,
        pub fail_reads: bool,
    }

    impl FlakyStore {
        #[must_use]
        pub fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                ..Self::default()
            }
        }

        fn rejected(op: &str) -> DataError {
            DataError::Rejected(format!("{op} refused"))
        }
    }

    impl DataAccess for FlakyStore {
        fn list(
            &self,
            entity: Entity,
            filter: &[Filter],
            fields: &[&str],
            order: Option<&Order>,
        ) -> Result<Vec<Record>, DataError> {
            if self.fail_reads {
                return Err(Self::rejected("list"));
            }
            self.inner.list(entity, filter, fields, order)
        }

        fn get(&self, entity: Entity, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>, DataError> {
            if self.fail_reads {
                return Err(Self::rejected("get"));
            }
            self.inner.get(entity, ids, fields)
        }

        fn create(&mut self, entity: Entity, fields: Record) -> Result<RecordId, DataError> {
            if self.fail_creates {
                return Err(Self::rejected("create"));
            }
            self.inner.create(entity, fields)
        }

        fn update(&mut self, entity: Entity, ids: &[RecordId], fields: Record) -> Result<(), DataError> {
            if self.fail_creates {
                return Err(Self::rejected("update"));
            }
            self.inner.update(entity, ids, fields)
        }

        fn delete(&mut self, entity: Entity, ids: &[RecordId]) -> Result<(), DataError> {
            if self.fail_deletes {
                return Err(Self::rejected("delete"));
            }
            self.inner.delete(entity, ids)
        }
    }

    /// Builder for pointer gestures with steadily advancing timestamps
    pub struct GestureBuilder {
        events: Vec<PointerEvent>,
        clock_ms: u64,
        step_ms: u64,
        last: (f32, f32),
    }

    impl Default for GestureBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GestureBuilder {
        /// Events 16ms apart, starting at t=1000
        #[must_use]
        pub fn new() -> Self {
            Self {
                events: Vec::new(),
                clock_ms: 1000,
                step_ms: 16,
                last: (0.0, 0.0),
            }
        }

        #[must_use]
        pub fn step_ms(mut self, step: u64) -> Self {
            self.step_ms = step;
            self
        }

        fn push(mut self, event: PointerEvent) -> Self {
            self.last = (event.x, event.y);
            self.events.push(event);
            self.clock_ms += self.step_ms;
            self
        }

        #[must_use]
        pub fn down(self, x: f32, y: f32) -> Self {
            let t = self.clock_ms;
            self.push(PointerEvent::down(x, y, t))
        }

        #[must_use]
        pub fn move_to(self, x: f32, y: f32) -> Self {
            let t = self.clock_ms;
            self.push(PointerEvent::moved(x, y, t))
        }

        /// Release at the last position
        #[must_use]
        pub fn up(self) -> Self {
            let (x, y, t) = (self.last.0, self.last.1, self.clock_ms);
            self.push(PointerEvent::up(x, y, t))
        }

        #[must_use]
        pub fn double(self, x: f32, y: f32) -> Self {
            let t = self.clock_ms;
            self.push(PointerEvent::double(x, y, t))
        }

        /// Press on the first point, drag through the rest, release
        #[must_use]
        pub fn lasso(self, points: &[(f32, f32)]) -> Self {
            let Some((first, rest)) = points.split_first() else {
                return self;
            };
            let mut builder = self.down(first.0, first.1);
            for point in rest {
                builder = builder.move_to(point.0, point.1);
            }
            builder.up()
        }

        #[must_use]
        pub fn build(self) -> Vec<PointerEvent> {
            self.events
        }

        #[must_use]
        pub fn into_input(self) -> Vec<InputEvent> {
            self.events.into_iter().map(InputEvent::Pointer).collect()
        }
    }
}

pub use test_helpers::*;
