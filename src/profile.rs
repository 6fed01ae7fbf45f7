use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CompressionError;

pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;
pub const GALLERY_MAX_WIDTH: u32 = 1600;
pub const GALLERY_MAX_HEIGHT: u32 = 1200;
pub const DEFAULT_QUALITY: f64 = 0.85;
pub const HIGH_QUALITY: f64 = 0.9;

/// Encoded image types the compressor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    WebP,
}

impl OutputType {
    pub const ALL: [OutputType; 3] = [OutputType::Jpeg, OutputType::Png, OutputType::WebP];

    /// Accepts a MIME type (`image/jpeg`) or a bare format name (`jpeg`, `jpg`).
    pub fn from_mime(value: &str) -> Result<Self, CompressionError> {
        let value = value.trim().to_lowercase();
        let subtype = value.strip_prefix("image/").unwrap_or(&value);
        match subtype {
            "jpeg" | "jpg" => Ok(OutputType::Jpeg),
            "png" => Ok(OutputType::Png),
            "webp" => Ok(OutputType::WebP),
            _ => Err(CompressionError::InvalidProfile(format!(
                "unsupported output type '{}'",
                value
            ))),
        }
    }

    pub fn mime(&self) -> mime::Mime {
        match self {
            OutputType::Jpeg => mime::IMAGE_JPEG,
            OutputType::Png => mime::IMAGE_PNG,
            // the mime crate has no WebP constant
            OutputType::WebP => "image/webp".parse().unwrap_or(mime::IMAGE_STAR),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Jpeg => "image/jpeg",
            OutputType::Png => "image/png",
            OutputType::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputType::Jpeg => "jpg",
            OutputType::Png => "png",
            OutputType::WebP => "webp",
        }
    }

    /// WebP output needs the `webp` cargo feature.
    pub fn is_available(&self) -> bool {
        match self {
            OutputType::WebP => cfg!(feature = "webp"),
            _ => true,
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size bounds and encoder settings for one compression call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionProfile {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: f64,
    pub output_type: OutputType,
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
            output_type: OutputType::Jpeg,
        }
    }
}

impl CompressionProfile {
    /// Preset for an event's main display image.
    pub fn display() -> Self {
        Self {
            quality: HIGH_QUALITY,
            ..Self::default()
        }
    }

    /// Preset for gallery images; larger bounds so photos don't pixelate.
    pub fn gallery() -> Self {
        Self {
            max_width: GALLERY_MAX_WIDTH,
            max_height: GALLERY_MAX_HEIGHT,
            quality: HIGH_QUALITY,
            ..Self::default()
        }
    }

    pub fn named(name: &str) -> Result<Self, CompressionError> {
        match name.trim().to_lowercase().as_str() {
            "default" => Ok(Self::default()),
            "display" => Ok(Self::display()),
            "gallery" => Ok(Self::gallery()),
            other => Err(CompressionError::InvalidProfile(format!(
                "unknown profile '{}', expected one of: default, display, gallery",
                other
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), CompressionError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(CompressionError::InvalidProfile(format!(
                "bounds must be positive, got {}x{}",
                self.max_width, self.max_height
            )));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(CompressionError::InvalidProfile(format!(
                "quality must be in (0, 1], got {}",
                self.quality
            )));
        }
        if !self.output_type.is_available() {
            return Err(CompressionError::InvalidProfile(format!(
                "{} output is not enabled in this build",
                self.output_type
            )));
        }
        Ok(())
    }

    /// Quality on the 1..=100 scale used by the JPEG and PNG encoders.
    pub fn quality_percent(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

pub fn get_display_image_settings() -> CompressionProfile {
    CompressionProfile::display()
}

pub fn get_gallery_image_settings() -> CompressionProfile {
    CompressionProfile::gallery()
}

/// Partial profile; unset fields fall back to the base profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileOverrides {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<f64>,
    pub output_type: Option<OutputType>,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, base: CompressionProfile) -> Result<CompressionProfile, CompressionError> {
        let profile = CompressionProfile {
            max_width: self.max_width.unwrap_or(base.max_width),
            max_height: self.max_height.unwrap_or(base.max_height),
            quality: self.quality.unwrap_or(base.quality),
            output_type: self.output_type.unwrap_or(base.output_type),
        };
        profile.validate()?;
        Ok(profile)
    }
}
