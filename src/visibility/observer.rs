//! Intersection observation for a single element.
//!
//! [`IntersectionWatch`] owns at most one live observation. Changing the
//! element or the options tears the old observation down before a new one is
//! established, and once the watch is disconnected (or dropped) its callback
//! never runs again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::geometry::{Rect, RootMargin};
use crate::error::ObserverError;

/// Default fraction of the target that must be visible.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

// =============================================================================
// Options and Entries
// =============================================================================

/// Identifier of an observable element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(Arc<str>);

impl ElementId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Observation options.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    /// Visible fraction of the target required to count as intersecting
    pub threshold: f64,

    /// Element used as the viewport; `None` means the top-level viewport
    pub root: Option<ElementId>,

    /// Margin applied to the root's bounds
    pub root_margin: RootMargin,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            root: None,
            root_margin: RootMargin::default(),
        }
    }
}

impl ObserverOptions {
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, ObserverError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ObserverError::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(self)
    }

    pub fn with_root(mut self, root: impl Into<ElementId>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_root_margin(mut self, margin: &str) -> Result<Self, ObserverError> {
        self.root_margin = margin.parse()?;
        Ok(self)
    }
}

/// One reported intersection change.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub target: ElementId,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,

    /// Target bounds at the time of the report
    pub bounding_rect: Rect,

    /// Root bounds after applying the margin; `None` when not computed
    pub root_bounds: Option<Rect>,
}

impl IntersectionEntry {
    /// Synthetic entry used when observation is unavailable.
    pub fn assumed_visible(target: ElementId) -> Self {
        Self {
            target,
            is_intersecting: true,
            intersection_ratio: 1.0,
            bounding_rect: Rect::default(),
            root_bounds: None,
        }
    }
}

/// Callback invoked with `(is_intersecting, entry)`.
pub type IntersectionCallback = Arc<dyn Fn(bool, &IntersectionEntry) + Send + Sync>;

/// Delivery end handed to a backend. Delivers nothing once its observation
/// has been torn down.
#[derive(Clone)]
pub struct IntersectionSink {
    active: Arc<AtomicBool>,
    callback: IntersectionCallback,
}

impl IntersectionSink {
    /// Invoke the callback once per entry, in the order given. The active
    /// flag is checked before each entry, so a teardown stops the rest of
    /// the batch.
    pub fn deliver(&self, entries: &[IntersectionEntry]) {
        for entry in entries {
            if !self.is_active() {
                return;
            }
            (self.callback)(entry.is_intersecting, entry);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

// =============================================================================
// Backends
// =============================================================================

/// A running observation of one element.
pub trait Observation: Send {
    fn disconnect(&mut self);
}

/// Something able to watch elements for viewport intersection.
pub trait ObserverBackend: Send + Sync {
    fn observe(
        &self,
        target: &ElementId,
        options: &ObserverOptions,
        sink: IntersectionSink,
    ) -> Box<dyn Observation>;
}

/// Whether the runtime can observe intersections at all.
#[derive(Clone)]
pub enum ObserverCapability {
    Supported(Arc<dyn ObserverBackend>),

    /// Every observed element is reported visible straight away
    Unsupported,
}

impl ObserverCapability {
    pub fn detect(backend: Option<Arc<dyn ObserverBackend>>) -> Self {
        match backend {
            Some(backend) => ObserverCapability::Supported(backend),
            None => ObserverCapability::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, ObserverCapability::Supported(_))
    }
}

// =============================================================================
// Intersection Watch
// =============================================================================

struct ActiveObservation {
    active: Arc<AtomicBool>,
    observation: Option<Box<dyn Observation>>,
}

/// Observes one (optional) element and reports intersection changes.
pub struct IntersectionWatch {
    capability: ObserverCapability,
    callback: IntersectionCallback,
    element: Option<ElementId>,
    options: ObserverOptions,
    current: Option<ActiveObservation>,
}

impl IntersectionWatch {
    /// Start observing `element`. With no element nothing is observed and
    /// the callback is never invoked.
    pub fn observe<F>(
        capability: ObserverCapability,
        element: Option<ElementId>,
        options: ObserverOptions,
        callback: F,
    ) -> Self
    where
        F: Fn(bool, &IntersectionEntry) + Send + Sync + 'static,
    {
        let mut watch = Self {
            capability,
            callback: Arc::new(callback),
            element,
            options,
            current: None,
        };
        watch.establish();
        watch
    }

    /// Observe `element` and latch the first intersecting report into a
    /// channel. The value goes `false -> true` at most once.
    pub fn visibility(
        capability: ObserverCapability,
        element: Option<ElementId>,
        options: ObserverOptions,
    ) -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let watch = Self::observe(capability, element, options, move |is_intersecting, _| {
            if is_intersecting {
                tx.send_if_modified(|visible| !std::mem::replace(visible, true));
            }
        });
        (watch, rx)
    }

    /// Point the watch at a new element and/or options. A no-op when
    /// neither changed.
    pub fn update(&mut self, element: Option<ElementId>, options: ObserverOptions) {
        if element == self.element && options == self.options {
            return;
        }
        self.teardown();
        self.element = element;
        self.options = options;
        self.establish();
    }

    /// Stop observing. No callback starts after this returns. A callback
    /// already running on another thread is not waited for.
    pub fn disconnect(&mut self) {
        self.teardown();
    }

    pub fn is_observing(&self) -> bool {
        self.current.is_some()
    }

    pub fn element(&self) -> Option<&ElementId> {
        self.element.as_ref()
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    fn establish(&mut self) {
        let Some(target) = self.element.clone() else {
            return;
        };

        let active = Arc::new(AtomicBool::new(true));
        let sink = IntersectionSink {
            active: Arc::clone(&active),
            callback: Arc::clone(&self.callback),
        };

        match &self.capability {
            ObserverCapability::Supported(backend) => {
                let observation = backend.observe(&target, &self.options, sink);
                self.current = Some(ActiveObservation {
                    active,
                    observation: Some(observation),
                });
            }
            ObserverCapability::Unsupported => {
                debug!(
                    element = target.as_str(),
                    "intersection observer unavailable, assuming visible"
                );
                self.current = Some(ActiveObservation {
                    active,
                    observation: None,
                });
                sink.deliver(&[IntersectionEntry::assumed_visible(target)]);
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(current) = self.current.take() {
            current.active.store(false, Ordering::Release);
            if let Some(mut observation) = current.observation {
                observation.disconnect();
            }
        }
    }
}

impl Drop for IntersectionWatch {
    fn drop(&mut self) {
        self.teardown();
    }
}
