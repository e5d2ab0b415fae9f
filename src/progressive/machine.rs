//! Progressive image state machine.
//!
//! ```text
//! Idle ──(visible | eager)──► LowQualityLoading ──ok──► HighQualityLoading ──ok──► HighQualityLoaded
//!   │                                │                        ▲      │
//!   └──(eager, !progressive)─────────┼────────────────────────┘      │
//!                                    └──────────err──────► Error ◄───┘
//! ```
//!
//! The machine performs no I/O. [`ProgressiveImage::start`] and
//! [`ProgressiveImage::handle`] return the [`Effect`]s the caller must carry
//! out, in order. `Error` is terminal: every later event is ignored.

use std::time::Duration;

use super::props::ProgressiveImageProps;

/// Text of the error placeholder.
pub const IMAGE_UNAVAILABLE: &str = "Image unavailable";

/// Where the instance is in its load sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    LowQualityLoading,
    HighQualityLoading,
    HighQualityLoaded,
    Error,
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEvent {
    /// The visibility watch reported the image intersecting
    Visible,
    LowQualityLoaded,
    LowQualityFailed(String),
    HighQualityLoaded,
    HighQualityFailed(String),
}

/// Work requested by the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadLowQuality(String),
    LoadHighQuality(String),
    /// Fire-and-forget cache warm-up of the high-quality URL
    WarmCache(String),
    NotifyLoaded,
    NotifyError(String),
}

/// One `<img>`-like layer of the rendered output.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayer {
    pub src: String,
    pub alt: String,
    pub width: u32,
    pub height: u32,
    pub fill: bool,
    pub sizes: Option<String>,
    pub srcset: Option<String>,
    /// Fully opaque once the layer has loaded
    pub opaque: bool,
    /// Opacity transition; set on the high-quality layer only
    pub fade_in: Option<Duration>,
    /// Request immediately rather than lazily
    pub eager: bool,
}

/// What an instance renders in its current state.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    /// Terminal error placeholder. No image layer is shown with it.
    Unavailable { message: &'static str },

    /// Placeholder and image layers, bottom to top.
    Layers {
        placeholder: Option<String>,
        low_quality: Option<ImageLayer>,
        high_quality: Option<ImageLayer>,
    },
}

/// State of one progressive image instance.
#[derive(Debug, Clone)]
pub struct ProgressiveImage {
    props: ProgressiveImageProps,
    phase: LoadPhase,
    visible: bool,
    should_load: bool,
    low_quality_loaded: bool,
    high_quality_loaded: bool,
    has_error: bool,
    started: bool,
}

impl ProgressiveImage {
    pub fn new(props: ProgressiveImageProps) -> Self {
        Self {
            props,
            phase: LoadPhase::Idle,
            visible: false,
            should_load: false,
            low_quality_loaded: false,
            high_quality_loaded: false,
            has_error: false,
            started: false,
        }
    }

    pub fn props(&self) -> &ProgressiveImageProps {
        &self.props
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Latched: never reverts once set.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn should_load(&self) -> bool {
        self.should_load
    }

    pub fn low_quality_loaded(&self) -> bool {
        self.low_quality_loaded
    }

    pub fn high_quality_loaded(&self) -> bool {
        self.high_quality_loaded
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self.phase, LoadPhase::HighQualityLoaded | LoadPhase::Error)
    }

    /// Construction step. Eager instances begin loading immediately; lazy
    /// ones stay idle until [`ImageEvent::Visible`]. Only the first call has
    /// any effect.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.started {
            return Vec::new();
        }
        self.started = true;

        if self.props.is_eager() {
            self.begin_loading()
        } else {
            Vec::new()
        }
    }

    /// Apply one event.
    pub fn handle(&mut self, event: ImageEvent) -> Vec<Effect> {
        if self.has_error {
            return Vec::new();
        }

        match event {
            ImageEvent::Visible => {
                self.visible = true;
                if self.should_load {
                    Vec::new()
                } else {
                    self.started = true;
                    self.begin_loading()
                }
            }
            ImageEvent::LowQualityLoaded if self.phase == LoadPhase::LowQualityLoading => {
                self.low_quality_loaded = true;
                self.phase = LoadPhase::HighQualityLoading;
                vec![Effect::LoadHighQuality(self.props.high_quality_url())]
            }
            ImageEvent::HighQualityLoaded if self.phase == LoadPhase::HighQualityLoading => {
                self.high_quality_loaded = true;
                self.phase = LoadPhase::HighQualityLoaded;
                vec![Effect::NotifyLoaded]
            }
            ImageEvent::LowQualityFailed(reason)
                if self.phase == LoadPhase::LowQualityLoading =>
            {
                self.fail(reason)
            }
            ImageEvent::HighQualityFailed(reason)
                if self.phase == LoadPhase::HighQualityLoading =>
            {
                self.fail(reason)
            }
            // Stale completion for a stage that is not in flight
            _ => Vec::new(),
        }
    }

    fn begin_loading(&mut self) -> Vec<Effect> {
        self.should_load = true;

        let mut effects = Vec::with_capacity(2);
        if self.props.progressive {
            self.phase = LoadPhase::LowQualityLoading;
            effects.push(Effect::LoadLowQuality(self.props.low_quality_url()));
        } else {
            self.phase = LoadPhase::HighQualityLoading;
            effects.push(Effect::LoadHighQuality(self.props.high_quality_url()));
        }

        if self.props.preload && !self.props.priority {
            effects.push(Effect::WarmCache(self.props.high_quality_url()));
        }
        effects
    }

    fn fail(&mut self, reason: String) -> Vec<Effect> {
        self.has_error = true;
        self.phase = LoadPhase::Error;
        vec![Effect::NotifyError(reason)]
    }

    /// Layers to render for the current state.
    pub fn render(&self) -> RenderPlan {
        if self.has_error {
            return RenderPlan::Unavailable {
                message: IMAGE_UNAVAILABLE,
            };
        }

        let props = &self.props;
        let eager = props.is_eager();

        let placeholder = if self.low_quality_loaded || self.high_quality_loaded {
            None
        } else {
            props.placeholder_url()
        };

        let low_quality = (self.should_load && props.progressive && !self.high_quality_loaded)
            .then(|| ImageLayer {
                src: props.low_quality_url(),
                alt: String::new(),
                width: props.width,
                height: props.height,
                fill: props.fill,
                sizes: None,
                srcset: None,
                opaque: self.low_quality_loaded,
                fade_in: None,
                eager: true,
            });

        let high_quality_started = matches!(
            self.phase,
            LoadPhase::HighQualityLoading | LoadPhase::HighQualityLoaded
        );
        let high_quality = high_quality_started.then(|| ImageLayer {
            src: props.high_quality_url(),
            alt: props.alt.clone(),
            width: props.width,
            height: props.height,
            fill: props.fill,
            sizes: Some(props.sizes_hint()),
            srcset: Some(props.srcset()),
            opaque: self.high_quality_loaded,
            fade_in: Some(props.fade_in_duration),
            eager,
        });

        RenderPlan::Layers {
            placeholder,
            low_quality,
            high_quality,
        }
    }
}
