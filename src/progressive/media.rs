//! Image URL and markup helpers.
//!
//! These are pure functions: they build the query-parameterised URLs an
//! image CDN understands, the inline blur placeholder shown before loading,
//! and the responsive `sizes` / `srcset` strings.

use url::form_urlencoded;

/// Default quality of the full-resolution request.
pub const DEFAULT_QUALITY: u8 = 85;

/// Default quality of the low-quality request.
pub const DEFAULT_LOW_QUALITY: u8 = 20;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// Query parameters owned by [`optimized_url`].
const OWNED_PARAMS: [&str; 4] = ["w", "h", "q", "fm"];

/// Clamp a quality value into `MIN_QUALITY..=MAX_QUALITY`.
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

/// Sizing and encoding parameters for [`optimized_url`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUrlParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
    /// Output format, e.g. `webp` or `avif`
    pub format: Option<String>,
}

impl ImageUrlParams {
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Append `w`, `h`, `q` and `fm` query parameters to `src`.
///
/// Existing values of those parameters are replaced; all other parameters
/// and the fragment are preserved. Inline `data:` URLs are returned as-is.
///
/// ```
/// use image_preloader::{optimized_url, ImageUrlParams};
///
/// let url = optimized_url("/img/hero.jpg?v=2", &ImageUrlParams::default().width(800).quality(85));
/// assert_eq!(url, "/img/hero.jpg?v=2&w=800&q=85");
/// ```
pub fn optimized_url(src: &str, params: &ImageUrlParams) -> String {
    if src.starts_with("data:") {
        return src.to_string();
    }

    let (rest, fragment) = match src.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (src, None),
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if !OWNED_PARAMS.contains(&key.as_ref()) {
            serializer.append_pair(&key, &value);
        }
    }
    if let Some(width) = params.width {
        serializer.append_pair("w", &width.to_string());
    }
    if let Some(height) = params.height {
        serializer.append_pair("h", &height.to_string());
    }
    if let Some(quality) = params.quality {
        serializer.append_pair("q", &clamp_quality(quality).to_string());
    }
    if let Some(format) = params.format.as_deref().filter(|f| !f.is_empty()) {
        serializer.append_pair("fm", format);
    }
    let query = serializer.finish();

    let mut url = String::with_capacity(src.len() + query.len() + 1);
    url.push_str(path);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// Inline SVG data URL used as the blurred placeholder.
pub fn blur_placeholder(width: u32, height: u32) -> String {
    let width = width.max(1);
    let height = height.max(1);
    let svg = format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<defs><filter id="b"><feGaussianBlur stdDeviation="20"/></filter></defs>"#,
            r##"<rect width="100%" height="100%" fill="#e5e7eb" filter="url(#b)"/>"##,
            "</svg>"
        ),
        w = width,
        h = height
    );
    format!("data:image/svg+xml,{}", urlencoding::encode(&svg))
}

/// Layout breakpoints (CSS pixels) used for default responsive hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoints {
    pub mobile: u32,
    pub tablet: u32,
    pub desktop: u32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            mobile: 640,
            tablet: 1024,
            desktop: 1920,
        }
    }
}

impl Breakpoints {
    /// Full width on mobile, half on tablet, a third beyond.
    pub fn sizes(&self) -> String {
        format!(
            "(max-width: {}px) 100vw, (max-width: {}px) 50vw, 33vw",
            self.mobile, self.tablet
        )
    }

    /// Candidate widths for `srcset`, ascending.
    pub fn widths(&self) -> [u32; 3] {
        let mut widths = [self.mobile, self.tablet, self.desktop];
        widths.sort_unstable();
        widths
    }
}

/// `srcset` with one optimized candidate per width.
pub fn srcset(src: &str, widths: &[u32], quality: u8) -> String {
    widths
        .iter()
        .map(|&width| {
            let url = optimized_url(src, &ImageUrlParams::default().width(width).quality(quality));
            format!("{} {}w", url, width)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
