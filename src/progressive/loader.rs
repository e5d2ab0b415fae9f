//! Drives a [`ProgressiveImage`] against a [`PreloadCache`].

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::cache::PreloadCache;
use crate::error::PreloadError;
use crate::source::{ImageHandle, ImageLoadOptions, ImageSource};

use super::machine::{Effect, ImageEvent, ProgressiveImage};
use super::props::ProgressiveImageProps;

type LoadCallback = Arc<dyn Fn(&ImageHandle) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&PreloadError) + Send + Sync>;

/// How a loader run ended.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The high-quality image loaded
    Loaded(ImageHandle),
    Failed(PreloadError),
    /// The visibility channel closed before the image became visible
    NeverVisible,
}

/// Executes the effects of one progressive image.
///
/// Loads go through the shared cache, so several instances showing the same
/// image issue one request.
///
/// # Example
///
/// ```ignore
/// let (_watch, visible) = IntersectionWatch::visibility(capability, Some(id), props.observer_options()?);
/// let mut loader = ProgressiveLoader::new(cache.clone(), props)
///     .on_load(|image| info!(bytes = image.len(), "hero loaded"));
/// loader.run(visible).await;
/// ```
pub struct ProgressiveLoader<S> {
    cache: PreloadCache<S>,
    image: ProgressiveImage,
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
}

impl<S: ImageSource + 'static> ProgressiveLoader<S> {
    pub fn new(cache: PreloadCache<S>, props: ProgressiveImageProps) -> Self {
        Self {
            cache,
            image: ProgressiveImage::new(props),
            on_load: None,
            on_error: None,
        }
    }

    pub fn on_load<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ImageHandle) + Send + Sync + 'static,
    {
        self.on_load = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PreloadError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Current machine state, e.g. for rendering.
    pub fn image(&self) -> &ProgressiveImage {
        &self.image
    }

    /// Run until the image settles. Lazy images first wait for `visible`
    /// to become `true`.
    pub async fn run(&mut self, mut visible: watch::Receiver<bool>) -> LoadOutcome {
        let props = self.image.props().clone();
        let low_options = props.low_quality_options();
        let high_options = props.high_quality_options();

        let mut loaded: Option<ImageHandle> = None;
        let mut failure: Option<PreloadError> = None;
        let mut effects: VecDeque<Effect> = self.image.start().into();

        loop {
            let Some(effect) = effects.pop_front() else {
                if self.image.should_load() {
                    break;
                }
                if visible.wait_for(|v| *v).await.is_err() {
                    debug!(src = %props.src, "visibility channel closed before image was visible");
                    return LoadOutcome::NeverVisible;
                }
                effects.extend(self.image.handle(ImageEvent::Visible));
                continue;
            };

            match effect {
                Effect::LoadLowQuality(url) => {
                    let pending = self.cache.begin_load(&url, &low_options).await;
                    self.issue_warmups(&mut effects, &high_options).await;

                    let event = match pending.wait().await {
                        Ok(_) => ImageEvent::LowQualityLoaded,
                        Err(e) => {
                            let reason = e.to_string();
                            failure = Some(e);
                            ImageEvent::LowQualityFailed(reason)
                        }
                    };
                    effects.extend(self.image.handle(event));
                }
                Effect::LoadHighQuality(url) => {
                    let pending = self.cache.begin_load(&url, &high_options).await;
                    self.issue_warmups(&mut effects, &high_options).await;

                    let event = match pending.wait().await {
                        Ok(handle) => {
                            loaded = Some(handle);
                            ImageEvent::HighQualityLoaded
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            failure = Some(e);
                            ImageEvent::HighQualityFailed(reason)
                        }
                    };
                    effects.extend(self.image.handle(event));
                }
                Effect::WarmCache(url) => {
                    if !self.image.has_error() {
                        self.cache.warm(&url, &high_options).await;
                    }
                }
                Effect::NotifyLoaded => {
                    if let (Some(callback), Some(handle)) = (&self.on_load, &loaded) {
                        callback(handle);
                    }
                }
                Effect::NotifyError(reason) => {
                    debug!(src = %props.src, reason = %reason, "progressive image failed");
                    if let (Some(callback), Some(error)) = (&self.on_error, &failure) {
                        callback(error);
                    }
                }
            }
        }

        match (loaded, failure) {
            (Some(handle), _) => LoadOutcome::Loaded(handle),
            (None, Some(error)) => LoadOutcome::Failed(error),
            (None, None) => LoadOutcome::NeverVisible,
        }
    }

    /// Issue queued warm-ups now instead of after the load in flight
    /// settles. Other effects keep their order.
    async fn issue_warmups(&self, effects: &mut VecDeque<Effect>, options: &ImageLoadOptions) {
        let mut rest = VecDeque::with_capacity(effects.len());
        for effect in effects.drain(..) {
            match effect {
                Effect::WarmCache(url) => {
                    debug!(url = %url, "warming high quality image");
                    self.cache.warm(&url, options).await;
                }
                other => rest.push_back(other),
            }
        }
        *effects = rest;
    }
}
