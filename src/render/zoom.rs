//! Viewport scaling
//!
//! Turns a container width, the page's intrinsic width and the user's zoom
//! intent into the scale handed to the rasterizer.

use log::debug;

/// What the user asked for
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ZoomIntent {
    /// Fit page width into the container
    #[default]
    AutoFit,
    /// Fixed scale factor (1.0 = 100%)
    Explicit(f32),
}

/// Zoom state for one render context
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Zoom {
    pub intent: ZoomIntent,
}

impl Zoom {
    /// Auto-fit never upscales beyond this
    pub const FIT_MAX_SCALE: f32 = 2.0;
    /// Auto-fit never shrinks below this
    pub const FIT_MIN_SCALE: f32 = 0.5;
    /// Explicit zoom floor
    pub const MIN_SCALE: f32 = 0.25;
    /// Explicit zoom ceiling
    pub const MAX_SCALE: f32 = 4.0;
    /// Increment per zoom action
    pub const STEP: f32 = 0.25;

    #[must_use]
    pub fn explicit(scale: f32) -> Self {
        Self {
            intent: ZoomIntent::Explicit(Self::clamp_factor(scale)),
        }
    }

    /// `clamp(min(W / w0, 2.0), 0.5, 2.0)`
    #[must_use]
    pub fn auto_fit_scale(container_width: f32, intrinsic_width: f32) -> f32 {
        if intrinsic_width.is_nan() || intrinsic_width <= 0.0 || !container_width.is_finite() {
            return 1.0;
        }
        (container_width / intrinsic_width)
            .min(Self::FIT_MAX_SCALE)
            .clamp(Self::FIT_MIN_SCALE, Self::FIT_MAX_SCALE)
    }

    /// Clamp factor to the explicit range, handling NaN/Inf
    #[must_use]
    pub fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
        }
    }

    /// Scale to render at for the given container and page widths
    #[must_use]
    pub fn effective_scale(&self, container_width: f32, intrinsic_width: f32) -> f32 {
        match self.intent {
            ZoomIntent::AutoFit => Self::auto_fit_scale(container_width, intrinsic_width),
            ZoomIntent::Explicit(scale) => Self::clamp_factor(scale),
        }
    }

    /// Zoom in one step from the currently displayed scale
    pub fn step_in(&mut self, current: f32) {
        self.intent = ZoomIntent::Explicit(Self::clamp_factor(current + Self::STEP));
    }

    /// Zoom out one step from the currently displayed scale
    pub fn step_out(&mut self, current: f32) {
        self.intent = ZoomIntent::Explicit(Self::clamp_factor(current - Self::STEP));
    }

    /// Back to 100%
    pub fn reset(&mut self) {
        self.intent = ZoomIntent::Explicit(1.0);
    }

    pub fn fit(&mut self) {
        self.intent = ZoomIntent::AutoFit;
    }
}

/// Display string for a scale, e.g. `"125%"`
#[must_use]
pub fn zoom_percent(scale: f32) -> String {
    format!("{}%", (scale * 100.0).round() as i32)
}

/// Container width bookkeeping with jitter suppression
///
/// A measured width replaces the cached one only when it moved by more than
/// `threshold` pixels and is larger than `min_width`.
#[derive(Clone, Debug)]
pub struct WidthTracker {
    last_width: Option<f32>,
    threshold: f32,
    min_width: f32,
    fallback: f32,
}

impl Default for WidthTracker {
    fn default() -> Self {
        Self::new(
            WidthTracker::DEFAULT_THRESHOLD,
            WidthTracker::DEFAULT_MIN_WIDTH,
            WidthTracker::DEFAULT_FALLBACK,
        )
    }
}

impl WidthTracker {
    pub const DEFAULT_THRESHOLD: f32 = 50.0;
    pub const DEFAULT_MIN_WIDTH: f32 = 100.0;
    /// Used before the container has been measured
    pub const DEFAULT_FALLBACK: f32 = 900.0;

    #[must_use]
    pub fn new(threshold: f32, min_width: f32, fallback: f32) -> Self {
        Self {
            last_width: None,
            threshold,
            min_width,
            fallback,
        }
    }

    /// Feed a new measurement. Returns true when the width changed enough to
    /// warrant a re-render.
    pub fn observe(&mut self, measured: f32) -> bool {
        if !measured.is_finite() || measured <= self.min_width {
            return false;
        }
        let previous = self.width();
        if (measured - previous).abs() <= self.threshold {
            return false;
        }
        debug!("Container width {previous} -> {measured}");
        self.last_width = Some(measured);
        true
    }

    /// Width to lay out against: last accepted measurement or the fallback
    #[must_use]
    pub fn width(&self) -> f32 {
        self.last_width.unwrap_or(self.fallback)
    }

    #[must_use]
    pub fn is_measured(&self) -> bool {
        self.last_width.is_some()
    }

    /// Forget the measurement (container unmounted)
    pub fn reset(&mut self) {
        self.last_width = None;
    }
}
