//! Progressive image loading.
//!
//! A progressive image renders a placeholder, then a cheap low-quality
//! variant, then the full-quality image faded in on top. Lazy images wait
//! for the visibility watch before requesting anything.
//!
//! # Components
//!
//! - [`ProgressiveImageProps`]: per-instance configuration
//! - [`ProgressiveImage`]: pure state machine emitting [`Effect`]s
//! - [`ProgressiveLoader`]: runs the machine against a [`crate::PreloadCache`]
//! - [`optimized_url`], [`blur_placeholder`], [`Breakpoints`]: URL helpers

mod loader;
mod machine;
mod media;
mod props;

pub use loader::{LoadOutcome, ProgressiveLoader};
pub use machine::{
    Effect, ImageEvent, ImageLayer, LoadPhase, ProgressiveImage, RenderPlan, IMAGE_UNAVAILABLE,
};
pub use media::{
    blur_placeholder, clamp_quality, optimized_url, srcset, Breakpoints, ImageUrlParams,
    DEFAULT_LOW_QUALITY, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
};
pub use props::{Placeholder, ProgressiveImageProps, DEFAULT_FADE_IN_MS, DEFAULT_ROOT_MARGIN};
