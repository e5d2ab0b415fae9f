//! Viewport visibility.
//!
//! [`IntersectionWatch`] observes one element through an
//! [`ObserverCapability`]. When the runtime has no observer backend the
//! capability is [`ObserverCapability::Unsupported`] and every element is
//! reported visible immediately, so lazy content is never hidden for good.
//!
//! [`ViewportObserver`] is a geometric backend driven by explicit viewport
//! and element rectangles.

mod geometry;
mod observer;
mod viewport;

pub use geometry::{MarginLength, Rect, RootMargin};
pub use observer::{
    ElementId, IntersectionCallback, IntersectionEntry, IntersectionSink, IntersectionWatch,
    Observation, ObserverBackend, ObserverCapability, ObserverOptions, DEFAULT_THRESHOLD,
};
pub use viewport::ViewportObserver;
