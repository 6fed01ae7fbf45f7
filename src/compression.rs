use bytes::Bytes;
use exif::{In, Reader, Tag, Value};
use futures::future::try_join_all;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::{debug, error, info};
use std::io::Cursor;
use std::str::FromStr;
use std::time::{Instant, SystemTime};

use crate::dimensions::calculate_dimensions;
use crate::errors::CompressionError;
use crate::image_file::ImageFile;
use crate::profile::{CompressionProfile, OutputType};

/// Files smaller than this are passed through untouched.
pub const SIZE_THRESHOLD_BYTES: usize = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegEncoderKind {
    MozJpeg,
    JpegEncoder,
}

impl JpegEncoderKind {
    pub const NAMES: [&'static str; 2] = ["mozjpeg", "jpeg-encoder"];

    pub fn name(&self) -> &'static str {
        match self {
            JpegEncoderKind::MozJpeg => "mozjpeg",
            JpegEncoderKind::JpegEncoder => "jpeg-encoder",
        }
    }
}

impl FromStr for JpegEncoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mozjpeg" => Ok(JpegEncoderKind::MozJpeg),
            "jpeg-encoder" => Ok(JpegEncoderKind::JpegEncoder),
            other => Err(format!(
                "unknown JPEG encoder '{}', expected one of {:?}",
                other,
                Self::NAMES
            )),
        }
    }
}

/// Resampling filter used when the image has to shrink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFilter {
    /// Bilinear, what most browsers use for canvas draws.
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl ResizeFilter {
    pub const NAMES: [&'static str; 3] = ["triangle", "catmullrom", "lanczos3"];

    fn filter_type(&self) -> FilterType {
        match self {
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triangle" | "bilinear" => Ok(ResizeFilter::Triangle),
            "catmullrom" => Ok(ResizeFilter::CatmullRom),
            "lanczos3" => Ok(ResizeFilter::Lanczos3),
            other => Err(format!(
                "unknown resize filter '{}', expected one of {:?}",
                other,
                Self::NAMES
            )),
        }
    }
}

/// Shrinks and re-encodes images before they are uploaded.
#[derive(Debug, Clone, Copy)]
pub struct ImageCompressor {
    size_threshold: usize,
    jpeg_encoder: JpegEncoderKind,
    png_quantize: bool,
    filter: ResizeFilter,
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self {
            size_threshold: SIZE_THRESHOLD_BYTES,
            jpeg_encoder: JpegEncoderKind::MozJpeg,
            png_quantize: false,
            filter: ResizeFilter::Lanczos3,
        }
    }
}

impl ImageCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size_threshold(mut self, bytes: usize) -> Self {
        self.size_threshold = bytes;
        self
    }

    pub fn with_jpeg_encoder(mut self, encoder: JpegEncoderKind) -> Self {
        self.jpeg_encoder = encoder;
        self
    }

    pub fn with_png_quantize(mut self, enabled: bool) -> Self {
        self.png_quantize = enabled;
        self
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn size_threshold(&self) -> usize {
        self.size_threshold
    }

    pub fn jpeg_encoder(&self) -> JpegEncoderKind {
        self.jpeg_encoder
    }

    /// Compresses one file. Decode and encode run on the blocking pool.
    pub async fn compress(
        &self,
        file: ImageFile,
        profile: &CompressionProfile,
    ) -> Result<ImageFile, CompressionError> {
        if !self.needs_reencode(&file, profile)? {
            return Ok(file);
        }

        let compressor = *self;
        let profile = *profile;
        tokio::task::spawn_blocking(move || compressor.reencode(&file, &profile))
            .await
            .map_err(|e| CompressionError::Encode(format!("compression task failed: {}", e)))?
    }

    /// Compresses every file concurrently. Output order follows input order;
    /// the first failure fails the whole batch.
    pub async fn compress_many(
        &self,
        files: Vec<ImageFile>,
        profile: &CompressionProfile,
    ) -> Result<Vec<ImageFile>, CompressionError> {
        let count = files.len();
        let tasks = files.into_iter().map(|file| self.compress(file, profile));

        let compressed = try_join_all(tasks).await.map_err(|e| {
            error!("Batch compression of {} images failed: {}", count, e);
            CompressionError::batch(e)
        })?;

        info!("Batch compressed {} images", compressed.len());
        Ok(compressed)
    }

    /// Synchronous variant of [`ImageCompressor::compress`].
    pub fn compress_blocking(
        &self,
        file: &ImageFile,
        profile: &CompressionProfile,
    ) -> Result<ImageFile, CompressionError> {
        if !self.needs_reencode(file, profile)? {
            return Ok(file.clone());
        }
        self.reencode(file, profile)
    }

    fn needs_reencode(
        &self,
        file: &ImageFile,
        profile: &CompressionProfile,
    ) -> Result<bool, CompressionError> {
        if !file.is_image() {
            return Err(CompressionError::InvalidInput(file.mime_type.clone()));
        }
        profile.validate()?;

        if file.size() < self.size_threshold {
            debug!(
                "{} is {} bytes, under the {} byte threshold; keeping original",
                file.name,
                file.size(),
                self.size_threshold
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn reencode(
        &self,
        file: &ImageFile,
        profile: &CompressionProfile,
    ) -> Result<ImageFile, CompressionError> {
        let start = Instant::now();
        let img = decode_image(&file.data)?;
        let (original_width, original_height) = (img.width(), img.height());

        let (width, height) = calculate_dimensions(
            original_width,
            original_height,
            profile.max_width,
            profile.max_height,
        );
        debug!(
            "{}: {}x{} -> {}x{} ({}, quality {})",
            file.name, original_width, original_height, width, height, profile.output_type, profile.quality
        );

        if width == 0 || height == 0 {
            return Err(CompressionError::Encode(format!(
                "target size {}x{} has no area",
                width, height
            )));
        }

        let resized = if (width, height) != (original_width, original_height) {
            img.resize_exact(width, height, self.filter.filter_type())
        } else {
            img
        };

        let data = self.encode(&resized, profile)?;
        if data.is_empty() {
            return Err(CompressionError::Encode("encoder produced no data".to_string()));
        }

        let reduction = (1.0 - data.len() as f64 / file.size() as f64) * 100.0;
        info!(
            "Image compressed: {} bytes → {} bytes ({}% reduction) in {:.2}ms",
            file.size(),
            data.len(),
            reduction.round() as i64,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(ImageFile {
            name: file.name.clone(),
            mime_type: profile.output_type.as_str().to_string(),
            data: Bytes::from(data),
            last_modified: SystemTime::now(),
            dimensions: Some((width, height)),
        })
    }

    fn encode(
        &self,
        img: &DynamicImage,
        profile: &CompressionProfile,
    ) -> Result<Vec<u8>, CompressionError> {
        let quality = profile.quality_percent();
        match profile.output_type {
            OutputType::Jpeg => match self.jpeg_encoder {
                JpegEncoderKind::MozJpeg => encode_mozjpeg(img, quality),
                JpegEncoderKind::JpegEncoder => encode_jpeg_encoder(img, quality),
            },
            OutputType::Png if self.png_quantize => encode_png_quantized(img, quality),
            OutputType::Png => encode_png(img),
            OutputType::WebP => encode_webp(img),
        }
    }
}

/// Compresses with the default compressor; `None` means the default profile.
pub async fn compress_image(
    file: ImageFile,
    profile: Option<&CompressionProfile>,
) -> Result<ImageFile, CompressionError> {
    let profile = profile.copied().unwrap_or_default();
    ImageCompressor::default().compress(file, &profile).await
}

pub async fn compress_images(
    files: Vec<ImageFile>,
    profile: Option<&CompressionProfile>,
) -> Result<Vec<ImageFile>, CompressionError> {
    let profile = profile.copied().unwrap_or_default();
    ImageCompressor::default().compress_many(files, &profile).await
}

/// Decodes from content, applying the EXIF orientation of JPEG sources the
/// way browsers do before drawing.
fn decode_image(data: &[u8]) -> Result<DynamicImage, CompressionError> {
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CompressionError::Decode(e.to_string()))?;
    let format = reader.format();

    let img = reader
        .decode()
        .map_err(|e| CompressionError::Decode(e.to_string()))?;

    if format == Some(ImageFormat::Jpeg) {
        if let Some(orientation) = read_exif_orientation(data) {
            return Ok(apply_exif_orientation(img, orientation));
        }
    }
    Ok(img)
}

fn read_exif_orientation(data: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(data);
    let exif = match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No EXIF data: {}", e);
            return None;
        }
    };

    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match field.value {
        Value::Short(ref values) if !values.is_empty() => Some(values[0]),
        _ => None,
    }
}

fn apply_exif_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    debug!("Applying EXIF orientation {}", orientation);
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn encode_mozjpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let raw = rgb.into_raw();

    // libjpeg errors surface as panics
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_mem_dest();
        comp.start_compress();

        let line_size = width as usize * 3;
        for line in raw.chunks(line_size) {
            comp.write_scanlines(line);
        }

        comp.finish_compress();
        comp.data_to_vec()
    }));

    match result {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(e)) => Err(CompressionError::Encode(format!("mozjpeg returned no data: {:?}", e))),
        Err(_) => Err(CompressionError::Encode("mozjpeg aborted".to_string())),
    }
}

fn encode_jpeg_encoder(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
    use jpeg_encoder::{ColorType, Encoder};

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(CompressionError::Encode(format!(
            "{}x{} is too large for JPEG",
            width, height
        )));
    }

    let mut output = Vec::new();
    let encoder = Encoder::new(&mut output, quality);
    encoder
        .encode(rgb.as_raw(), width as u16, height as u16, ColorType::Rgb)
        .map_err(|e| CompressionError::Encode(format!("jpeg-encoder failed: {:?}", e)))?;
    Ok(output)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, CompressionError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut output = Vec::new();
    {
        let mut encoder = png::Encoder::new(Cursor::new(&mut output), width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);

        let mut writer = encoder
            .write_header()
            .map_err(|e| CompressionError::Encode(format!("PNG header: {}", e)))?;
        writer
            .write_image_data(rgba.as_raw())
            .map_err(|e| CompressionError::Encode(format!("PNG data: {}", e)))?;
        writer
            .finish()
            .map_err(|e| CompressionError::Encode(format!("PNG trailer: {}", e)))?;
    }
    Ok(output)
}

/// Palette PNG through imagequant; transparency is kept in a tRNS chunk.
fn encode_png_quantized(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<imagequant::RGBA> = rgba
        .as_raw()
        .chunks_exact(4)
        .map(|c| imagequant::RGBA {
            r: c[0],
            g: c[1],
            b: c[2],
            a: c[3],
        })
        .collect();

    let quant_err = |stage: &str, e: imagequant::Error| {
        CompressionError::Encode(format!("imagequant {}: {:?}", stage, e))
    };

    let mut liq = imagequant::new();
    liq.set_quality(0, quality).map_err(|e| quant_err("quality", e))?;
    let mut image = liq
        .new_image(&pixels[..], width as usize, height as usize, 0.0)
        .map_err(|e| quant_err("image", e))?;
    let mut res = liq.quantize(&mut image).map_err(|e| quant_err("quantize", e))?;
    res.set_dithering_level(1.0)
        .map_err(|e| quant_err("dithering", e))?;
    let (palette, indexed) = res.remapped(&mut image).map_err(|e| quant_err("remap", e))?;

    let mut output = Vec::new();
    {
        let mut encoder = png::Encoder::new(Cursor::new(&mut output), width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);

        let plte: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
        let mut trns: Vec<u8> = palette.iter().map(|c| c.a).collect();
        while trns.last().copied() == Some(255) {
            trns.pop();
        }
        encoder.set_palette(plte);
        if !trns.is_empty() {
            encoder.set_trns(trns);
        }

        let mut writer = encoder
            .write_header()
            .map_err(|e| CompressionError::Encode(format!("PNG header: {}", e)))?;
        writer
            .write_image_data(&indexed)
            .map_err(|e| CompressionError::Encode(format!("PNG data: {}", e)))?;
        writer
            .finish()
            .map_err(|e| CompressionError::Encode(format!("PNG trailer: {}", e)))?;
    }
    Ok(output)
}

#[cfg(feature = "webp")]
fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, CompressionError> {
    let rgba = img.to_rgba8();
    let mut output = Vec::new();
    image::codecs::webp::WebPEncoder::new_lossless(&mut output)
        .encode(rgba.as_raw(), rgba.width(), rgba.height(), image::ColorType::Rgba8)
        .map_err(|e| CompressionError::Encode(format!("WebP: {}", e)))?;
    Ok(output)
}

#[cfg(not(feature = "webp"))]
fn encode_webp(_img: &DynamicImage) -> Result<Vec<u8>, CompressionError> {
    Err(CompressionError::Encode(
        "WebP output requires the `webp` feature".to_string(),
    ))
}
