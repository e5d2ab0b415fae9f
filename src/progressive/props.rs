//! Configuration of one progressive image instance.

use std::time::Duration;

use crate::error::ObserverError;
use crate::source::{FetchPriority, ImageLoadOptions};
use crate::visibility::ObserverOptions;

use super::media::{
    blur_placeholder, optimized_url, srcset, Breakpoints, ImageUrlParams, DEFAULT_LOW_QUALITY,
    DEFAULT_QUALITY,
};

/// Default fade-in of the high-quality layer, in milliseconds.
pub const DEFAULT_FADE_IN_MS: u64 = 500;

/// Default observer margin for lazy images: start loading slightly before
/// the image scrolls into view.
pub const DEFAULT_ROOT_MARGIN: &str = "50px";

/// What is shown before any image layer has loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// Blurred preview. `None` uses a generated neutral blur.
    Blur(Option<String>),
    Empty,
}

impl Default for Placeholder {
    fn default() -> Self {
        Placeholder::Blur(None)
    }
}

/// Properties of a progressive image.
///
/// # Example
///
/// ```
/// use image_preloader::ProgressiveImageProps;
///
/// let props = ProgressiveImageProps::new("/work/case-study.jpg", "Case study", 1200, 800)
///     .priority(true)
///     .quality(90);
/// assert!(props.is_eager());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressiveImageProps {
    pub src: String,
    /// Explicit low-quality source; derived from `src` when unset
    pub low_quality_src: Option<String>,
    pub alt: String,
    pub width: u32,
    pub height: u32,
    /// Explicit `sizes`; derived from `breakpoints` when unset
    pub sizes: Option<String>,
    pub priority: bool,
    /// Fill the parent container instead of using intrinsic dimensions
    pub fill: bool,
    pub quality: u8,
    pub low_quality: u8,
    pub placeholder: Placeholder,
    pub lazy: bool,
    pub preload: bool,
    pub progressive: bool,
    pub fade_in_duration: Duration,
    pub threshold: f64,
    pub root_margin: String,
    pub breakpoints: Breakpoints,
}

impl ProgressiveImageProps {
    pub fn new(src: impl Into<String>, alt: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            src: src.into(),
            low_quality_src: None,
            alt: alt.into(),
            width,
            height,
            sizes: None,
            priority: false,
            fill: false,
            quality: DEFAULT_QUALITY,
            low_quality: DEFAULT_LOW_QUALITY,
            placeholder: Placeholder::default(),
            lazy: true,
            preload: false,
            progressive: true,
            fade_in_duration: Duration::from_millis(DEFAULT_FADE_IN_MS),
            threshold: crate::visibility::DEFAULT_THRESHOLD,
            root_margin: DEFAULT_ROOT_MARGIN.to_string(),
            breakpoints: Breakpoints::default(),
        }
    }

    pub fn low_quality_src(mut self, src: impl Into<String>) -> Self {
        self.low_quality_src = Some(src.into());
        self
    }

    pub fn sizes(mut self, sizes: impl Into<String>) -> Self {
        self.sizes = Some(sizes.into());
        self
    }

    pub fn priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn low_quality(mut self, quality: u8) -> Self {
        self.low_quality = quality;
        self
    }

    pub fn placeholder(mut self, placeholder: Placeholder) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    pub fn progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }

    pub fn fade_in_duration(mut self, duration: Duration) -> Self {
        self.fade_in_duration = duration;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn root_margin(mut self, margin: impl Into<String>) -> Self {
        self.root_margin = margin.into();
        self
    }

    pub fn breakpoints(mut self, breakpoints: Breakpoints) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    /// Loading starts without waiting for visibility.
    pub fn is_eager(&self) -> bool {
        self.priority || self.preload || !self.lazy
    }

    /// URL of the full-resolution request.
    pub fn high_quality_url(&self) -> String {
        let params = ImageUrlParams::default()
            .width(self.width)
            .height(self.height)
            .quality(self.quality);
        optimized_url(&self.src, &params)
    }

    /// URL of the low-quality request: one tenth of the width, low quality.
    pub fn low_quality_url(&self) -> String {
        if let Some(src) = &self.low_quality_src {
            return src.clone();
        }
        let params = ImageUrlParams::default()
            .width(self.width.div_ceil(10).max(1))
            .quality(self.low_quality);
        optimized_url(&self.src, &params)
    }

    pub fn sizes_hint(&self) -> String {
        self.sizes
            .clone()
            .unwrap_or_else(|| self.breakpoints.sizes())
    }

    pub fn srcset(&self) -> String {
        srcset(&self.src, &self.breakpoints.widths(), self.quality)
    }

    /// Data URL of the placeholder layer, if one is shown.
    pub fn placeholder_url(&self) -> Option<String> {
        match &self.placeholder {
            Placeholder::Blur(Some(url)) => Some(url.clone()),
            Placeholder::Blur(None) => Some(blur_placeholder(self.width, self.height)),
            Placeholder::Empty => None,
        }
    }

    /// Observer options for the visibility watch.
    pub fn observer_options(&self) -> Result<ObserverOptions, ObserverError> {
        ObserverOptions::default()
            .with_threshold(self.threshold)?
            .with_root_margin(&self.root_margin)
    }

    /// Load options of the full-resolution request.
    pub fn high_quality_options(&self) -> ImageLoadOptions {
        ImageLoadOptions {
            sizes: Some(self.sizes_hint()),
            priority: if self.priority {
                FetchPriority::High
            } else {
                FetchPriority::Low
            },
        }
    }

    /// Load options of the low-quality request.
    pub fn low_quality_options(&self) -> ImageLoadOptions {
        ImageLoadOptions {
            sizes: None,
            priority: if self.priority {
                FetchPriority::High
            } else {
                FetchPriority::Low
            },
        }
    }
}
