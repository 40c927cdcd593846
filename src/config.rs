//! Configuration types for report export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. The config is cheap to clone (trait objects sit
//! behind `Arc`) so each concurrent normalisation task can hold its own copy.

use crate::error::ReportError;
use crate::pipeline::normalize::{DecodeBackend, NativeBackend};
use crate::progress::ProgressCallback;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Daily subsidy paid per travel day when nothing else is configured.
pub const DEFAULT_DAILY_RATE: f64 = 50.0;

/// Embedded invoice width in pixels. Heights follow the source aspect ratio.
pub const DEFAULT_IMAGE_WIDTH: u32 = 500;

/// Magnification used when rendering the first page of a PDF invoice.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Configuration for one report export.
///
/// # Example
/// ```rust
/// use trip_expense_report::{ExportConfig, Locale};
///
/// let config = ExportConfig::builder()
///     .daily_rate(80.0)
///     .locale(Locale::En)
///     .build()
///     .unwrap();
/// assert_eq!(config.image_width, 500);
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Subsidy paid per travel day. Must be positive. Default: 50.
    pub daily_rate: f64,

    /// Width of every embedded invoice image, in pixels. Default: 500.
    pub image_width: u32,

    /// First-page magnification for paginated invoices. Range 0.5–6.0. Default: 2.0.
    ///
    /// PDF pages are 72 units per inch; at 2× an A4 invoice renders to
    /// roughly 1190 × 1684 px, enough for small print to survive the
    /// downscale to [`Self::image_width`].
    pub render_scale: f32,

    /// Number of invoices decoded at once. Default: 4.
    pub concurrency: usize,

    /// JPEG quality of embedded invoices (1–100). Default: 90.
    pub jpeg_quality: u8,

    /// Language of fixed labels, remarks and the intro sentence. Default: zh-CN.
    pub locale: Locale,

    /// Creation timestamp written to the document properties.
    ///
    /// `None` (the default) keeps output byte-identical across runs for the
    /// same input.
    pub created: Option<DateTime<Utc>>,

    /// Raster/PDF decoder. Default: [`NativeBackend`] (image + pdfium).
    pub backend: Arc<dyn DecodeBackend>,

    /// Per-invoice progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            daily_rate: DEFAULT_DAILY_RATE,
            image_width: DEFAULT_IMAGE_WIDTH,
            render_scale: DEFAULT_RENDER_SCALE,
            concurrency: 4,
            jpeg_quality: 90,
            locale: Locale::default(),
            created: None,
            backend: Arc::new(NativeBackend),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("daily_rate", &self.daily_rate)
            .field("image_width", &self.image_width)
            .field("render_scale", &self.render_scale)
            .field("concurrency", &self.concurrency)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("locale", &self.locale)
            .field("created", &self.created)
            .field("backend", &"<dyn DecodeBackend>")
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints the builder's setters and `build()` enforce.
    ///
    /// Export entry points call this too, since the fields are public and a
    /// struct literal bypasses the builder.
    pub fn validate(&self) -> Result<(), ReportError> {
        if !self.daily_rate.is_finite() || self.daily_rate <= 0.0 {
            return Err(ReportError::InvalidConfig(format!(
                "Daily rate must be a positive number, got {}",
                self.daily_rate
            )));
        }
        if !self.render_scale.is_finite() || self.render_scale <= 0.0 {
            return Err(ReportError::InvalidConfig(format!(
                "Render scale must be a positive number, got {}",
                self.render_scale
            )));
        }
        if self.concurrency == 0 {
            return Err(ReportError::InvalidConfig(
                "Concurrency must be at least 1".into(),
            ));
        }
        if self.image_width == 0 {
            return Err(ReportError::InvalidConfig(
                "Image width must be at least 1 px".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ReportError::InvalidConfig(format!(
                "JPEG quality must be 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn daily_rate(mut self, rate: f64) -> Self {
        self.config.daily_rate = rate;
        self
    }

    pub fn image_width(mut self, px: u32) -> Self {
        self.config.image_width = px.clamp(50, 2000);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 6.0);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.config.locale = locale;
        self
    }

    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.config.created = Some(at);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn DecodeBackend>) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ReportError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Language used for the fixed text of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Locale {
    /// Simplified Chinese (default).
    #[default]
    ZhCn,
    /// English.
    En,
}

impl std::str::FromStr for Locale {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "cn" => Ok(Locale::ZhCn),
            "en" | "en-us" | "en-gb" | "en_us" => Ok(Locale::En),
            other => Err(ReportError::InvalidConfig(format!(
                "Unknown locale '{other}' (expected zh or en)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let c = ExportConfig::default();
        assert_eq!(c.daily_rate, DEFAULT_DAILY_RATE);
        assert_eq!(c.image_width, DEFAULT_IMAGE_WIDTH);
        assert_eq!(c.render_scale, DEFAULT_RENDER_SCALE);
        assert_eq!(c.locale, Locale::ZhCn);
        assert!(c.created.is_none());
    }

    #[test]
    fn builder_clamps_ranges() {
        let c = ExportConfig::builder()
            .concurrency(0)
            .render_scale(40.0)
            .jpeg_quality(0)
            .image_width(10)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.render_scale, 6.0);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.image_width, 50);
    }

    #[test]
    fn non_positive_rate_rejected() {
        for rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = ExportConfig::builder().daily_rate(rate).build().unwrap_err();
            assert!(matches!(err, ReportError::InvalidConfig(_)), "rate {rate}");
        }
    }

    #[test]
    fn struct_literal_config_is_validated() {
        let negative = ExportConfig {
            daily_rate: -5.0,
            ..ExportConfig::default()
        };
        assert!(matches!(negative.validate(), Err(ReportError::InvalidConfig(_))));

        let idle = ExportConfig {
            concurrency: 0,
            ..ExportConfig::default()
        };
        assert!(matches!(idle.validate(), Err(ReportError::InvalidConfig(_))));

        assert!(ExportConfig::default().validate().is_ok());
    }

    #[test]
    fn locale_parsing() {
        assert_eq!("zh".parse::<Locale>().unwrap(), Locale::ZhCn);
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", ExportConfig::default());
        assert!(dbg.contains("<dyn DecodeBackend>"));
        assert!(dbg.contains("daily_rate"));
    }
}
