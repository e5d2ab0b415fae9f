//! Geometric observer backend.
//!
//! Tracks a viewport rectangle and the layout rectangles of elements, and
//! reports intersection changes whenever either moves. Used for server-side
//! rendering of above-the-fold decisions and for driving the progressive
//! loader in tests and tools.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::geometry::Rect;
use super::observer::{
    ElementId, IntersectionEntry, IntersectionSink, Observation, ObserverBackend,
    ObserverCapability, ObserverOptions,
};

struct Registration {
    id: u64,
    target: ElementId,
    options: ObserverOptions,
    sink: IntersectionSink,
    last: Option<bool>,
}

struct ViewportState {
    viewport: Rect,
    elements: HashMap<ElementId, Rect>,
    registrations: Vec<Registration>,
    next_id: u64,
}

impl ViewportState {
    fn entry_for(&self, target: &ElementId, options: &ObserverOptions) -> IntersectionEntry {
        let bounding_rect = self.elements.get(target).copied();
        let root = match &options.root {
            None => Some(self.viewport),
            Some(root) => self.elements.get(root).copied(),
        };

        let (Some(bounds), Some(root)) = (bounding_rect, root) else {
            return IntersectionEntry {
                target: target.clone(),
                is_intersecting: false,
                intersection_ratio: 0.0,
                bounding_rect: bounding_rect.unwrap_or_default(),
                root_bounds: None,
            };
        };

        let root_bounds = options.root_margin.apply(root);
        let overlap = bounds.intersection(&root_bounds);

        let intersection_ratio = match overlap {
            Some(overlap) if bounds.area() > 0.0 => (overlap.area() / bounds.area()).min(1.0),
            Some(_) => 1.0,
            None => 0.0,
        };
        let is_intersecting = overlap.is_some() && intersection_ratio >= options.threshold;

        IntersectionEntry {
            target: target.clone(),
            is_intersecting,
            intersection_ratio,
            bounding_rect: bounds,
            root_bounds: Some(root_bounds),
        }
    }

    /// Recompute every registration and collect the ones whose state changed.
    fn changes(&mut self) -> Vec<(IntersectionSink, IntersectionEntry)> {
        let mut changed = Vec::new();
        for index in 0..self.registrations.len() {
            let registration = &self.registrations[index];
            let entry = self.entry_for(&registration.target, &registration.options);

            let registration = &mut self.registrations[index];
            if registration.last != Some(entry.is_intersecting) {
                registration.last = Some(entry.is_intersecting);
                changed.push((registration.sink.clone(), entry));
            }
        }
        changed
    }
}

/// Viewport-geometry implementation of [`ObserverBackend`].
///
/// Cloning yields a handle to the same viewport.
///
/// # Example
///
/// ```ignore
/// let viewport = ViewportObserver::new(Rect::new(0.0, 0.0, 1280.0, 800.0));
/// viewport.place("footer-logo", Rect::new(0.0, 2400.0, 200.0, 80.0));
///
/// let (_watch, visible) = IntersectionWatch::visibility(
///     viewport.capability(),
///     Some("footer-logo".into()),
///     ObserverOptions::default(),
/// );
/// viewport.scroll_to(0.0, 2000.0); // footer-logo becomes visible
/// ```
#[derive(Clone)]
pub struct ViewportObserver {
    shared: Arc<Mutex<ViewportState>>,
}

impl ViewportObserver {
    pub fn new(viewport: Rect) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ViewportState {
                viewport,
                elements: HashMap::new(),
                registrations: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// This viewport as a supported observer capability.
    pub fn capability(&self) -> ObserverCapability {
        ObserverCapability::Supported(Arc::new(self.clone()))
    }

    pub fn viewport(&self) -> Rect {
        self.lock().viewport
    }

    /// Replace the viewport rectangle (resize or scroll).
    pub fn set_viewport(&self, viewport: Rect) {
        self.update(|state| state.viewport = viewport);
    }

    /// Move the viewport's top-left corner to `(x, y)`.
    pub fn scroll_to(&self, x: f64, y: f64) {
        self.update(|state| {
            state.viewport.x = x;
            state.viewport.y = y;
        });
    }

    pub fn scroll_by(&self, dx: f64, dy: f64) {
        self.update(|state| state.viewport = state.viewport.translate(dx, dy));
    }

    /// Set (or move) an element's layout rectangle.
    pub fn place(&self, element: impl Into<ElementId>, rect: Rect) {
        let element = element.into();
        self.update(|state| {
            state.elements.insert(element, rect);
        });
    }

    /// Forget an element's layout; observers of it report not intersecting.
    pub fn remove(&self, element: &ElementId) {
        self.update(|state| {
            state.elements.remove(element);
        });
    }

    /// Number of live observations.
    pub fn observation_count(&self) -> usize {
        self.lock().registrations.len()
    }

    fn update(&self, mutate: impl FnOnce(&mut ViewportState)) {
        let changed = {
            let mut state = self.lock();
            mutate(&mut state);
            state.changes()
        };

        // Delivered outside the lock so callbacks may touch the viewport
        for (sink, entry) in changed {
            sink.deliver(std::slice::from_ref(&entry));
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewportState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObserverBackend for ViewportObserver {
    fn observe(
        &self,
        target: &ElementId,
        options: &ObserverOptions,
        sink: IntersectionSink,
    ) -> Box<dyn Observation> {
        let (id, initial) = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;

            let entry = state.entry_for(target, options);
            state.registrations.push(Registration {
                id,
                target: target.clone(),
                options: options.clone(),
                sink: sink.clone(),
                last: Some(entry.is_intersecting),
            });
            (id, entry)
        };

        // Every new observation gets its initial state
        sink.deliver(std::slice::from_ref(&initial));

        Box::new(ViewportObservation {
            shared: Arc::clone(&self.shared),
            id,
        })
    }
}

struct ViewportObservation {
    shared: Arc<Mutex<ViewportState>>,
    id: u64,
}

impl Observation for ViewportObservation {
    fn disconnect(&mut self) {
        let mut state = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        state.registrations.retain(|r| r.id != self.id);
    }
}
