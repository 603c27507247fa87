// Export modules for use in tests
pub mod capture;
pub mod catalog;
pub mod color;
pub mod data;
pub mod error;
pub mod events;
pub mod geometry;
pub mod host;
pub mod notification;
pub mod panels;
pub mod panic_handler;
pub mod regions;
pub mod render;
pub mod session;
pub mod settings;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the viewer surface
pub use error::{DataError, EngineError, RasterFault, Severity};
pub use viewer::{AnnotationViewer, PointerOutcome, RasterizerFactory, ViewerConfig};
