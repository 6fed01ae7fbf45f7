use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse, Result};
use futures::TryStreamExt;
use log::{error, info};
use serde::Deserialize;
use std::collections::HashMap;

use crate::compression::ImageCompressor;
use crate::config::Config;
use crate::errors::ServiceError;
use crate::format::format_file_size;
use crate::image_file::ImageFile;
use crate::profile::{CompressionProfile, OutputType, ProfileOverrides};

/// Profile selection; query parameters win over form fields.
#[derive(Debug, Default, Deserialize)]
pub struct CompressionQuery {
    pub profile: Option<String>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<f64>,
    pub output_type: Option<String>,
}

pub struct FileUpload {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl FileUpload {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            filename: None,
            content_type: None,
        }
    }

    fn into_image_file(self) -> ImageFile {
        let name = self
            .filename
            .unwrap_or_else(|| format!("upload_{}", uuid::Uuid::new_v4()));
        let mime_type = self
            .content_type
            .unwrap_or_else(|| ImageFile::mime_from_name(&name).to_string());
        ImageFile::new(name, mime_type, self.data)
    }
}

impl Default for FileUpload {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for the compression endpoints.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub compressor: ImageCompressor,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, crate::config::ConfigError> {
        let compressor = config.compressor()?;
        Ok(Self { config, compressor })
    }
}

fn parse_field<T: std::str::FromStr>(
    form: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, ServiceError> {
    form.get(name)
        .map(|s| s.trim().parse::<T>())
        .transpose()
        .map_err(|_| ServiceError::InvalidParameters(format!("{} is not a valid number", name)))
}

fn resolve_profile(
    query: &CompressionQuery,
    form: &HashMap<String, String>,
    default_profile: CompressionProfile,
) -> Result<CompressionProfile, ServiceError> {
    let base = match query.profile.as_ref().or_else(|| form.get("profile")) {
        Some(name) => CompressionProfile::named(name)?,
        None => default_profile,
    };

    let overrides = ProfileOverrides {
        max_width: query.max_width.or(parse_field(form, "max_width")?),
        max_height: query.max_height.or(parse_field(form, "max_height")?),
        quality: query.quality.or(parse_field(form, "quality")?),
        output_type: query
            .output_type
            .as_ref()
            .or_else(|| form.get("output_type"))
            .map(|s| OutputType::from_mime(s))
            .transpose()?,
    };

    if overrides.is_empty() {
        base.validate()?;
        return Ok(base);
    }
    Ok(overrides.apply(base)?)
}

pub async fn compress_endpoint(
    mut payload: Multipart,
    query: web::Query<CompressionQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut file_upload: Option<FileUpload> = None;
    let mut form_params = HashMap::new();

    while let Some(field) = payload.try_next().await? {
        let field_name = field.name().to_string();

        if field_name == "file" {
            file_upload = Some(process_file_field(field, state.config.max_file_size_bytes()).await?);
        } else {
            let value = process_text_field(field).await?;
            form_params.insert(field_name, value);
        }
    }

    let file_upload = file_upload.ok_or(ServiceError::MissingFile)?;
    let profile = resolve_profile(&query, &form_params, state.config.default_profile())?;
    let source = file_upload.into_image_file();
    let original_size = source.size();

    info!(
        "Processing file: {} ({}, {}) with {}x{} @ {} as {}",
        source.name,
        format_file_size(original_size as u64),
        source.mime_type,
        profile.max_width,
        profile.max_height,
        profile.quality,
        profile.output_type
    );

    let compressed = match state.compressor.compress(source, &profile).await {
        Ok(file) => file,
        Err(err) => {
            error!("Compression failed: {}", err);
            return Err(ServiceError::from(err).into());
        }
    };

    let output_size = compressed.size();
    let mut response = HttpResponse::Ok();
    response
        .insert_header(("Content-Type", compressed.mime_type.clone()))
        .insert_header(("X-Original-Size", original_size.to_string()))
        .insert_header(("X-Compressed-Size", output_size.to_string()))
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", compressed.name.replace('"', "")),
        ));

    match compressed.dimensions {
        Some((width, height)) => {
            response
                .insert_header(("X-Image-Width", width.to_string()))
                .insert_header(("X-Image-Height", height.to_string()));
        }
        None => {
            response.insert_header(("X-Compression-Skipped", "true"));
        }
    }

    info!(
        "Returning {}: {} -> {}",
        compressed.name,
        format_file_size(original_size as u64),
        format_file_size(output_size as u64)
    );
    Ok(response.body(compressed.data))
}

async fn process_file_field(mut field: Field, max_size_bytes: usize) -> Result<FileUpload> {
    let mut upload = FileUpload::new();

    upload.filename = field
        .content_disposition()
        .get_filename()
        .map(|s| s.to_string());

    upload.content_type = field.content_type().map(|ct| ct.to_string());

    let mut data = Vec::new();
    let mut total_size = 0;

    while let Some(chunk) = field.try_next().await? {
        total_size += chunk.len();

        if total_size > max_size_bytes {
            return Err(ServiceError::FileTooLarge { max_size: max_size_bytes }.into());
        }

        data.extend_from_slice(&chunk);
    }

    upload.data = data;
    Ok(upload)
}

async fn process_text_field(mut field: Field) -> Result<String> {
    let mut data = Vec::new();

    while let Some(chunk) = field.try_next().await? {
        data.extend_from_slice(&chunk);

        if data.len() > 1024 {
            return Err(ServiceError::InvalidParameters("Text field too long".to_string()).into());
        }
    }

    String::from_utf8(data)
        .map_err(|_| ServiceError::InvalidParameters("Invalid UTF-8 in text field".to_string()).into())
}

pub async fn health_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "studio-media",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

pub async fn profiles_endpoint() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "default": CompressionProfile::default(),
        "display": CompressionProfile::display(),
        "gallery": CompressionProfile::gallery(),
    })))
}

pub async fn info_endpoint(state: web::Data<AppState>) -> Result<HttpResponse> {
    let config = &state.config;
    let output_types: Vec<_> = OutputType::ALL
        .iter()
        .map(|t| serde_json::json!({ "mime_type": t.as_str(), "available": t.is_available() }))
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "service": "Studio Media Service",
        "version": env!("CARGO_PKG_VERSION"),
        "config": {
            "max_file_size_mb": config.server.max_file_size_mb,
            "size_threshold": format_file_size(state.compressor.size_threshold() as u64),
            "jpeg_encoder": state.compressor.jpeg_encoder().name(),
            "default_profile": config.compression.default_profile,
        },
        "output_types": output_types,
        "usage": {
            "endpoint": "/compress",
            "method": "POST",
            "content_type": "multipart/form-data",
            "parameters": {
                "file": "Image file to compress (required)",
                "profile": "default | display | gallery (optional)",
                "max_width": "Maximum output width in pixels (optional)",
                "max_height": "Maximum output height in pixels (optional)",
                "quality": "Encoder quality in (0, 1] (optional)",
                "output_type": "image/jpeg | image/png | image/webp (optional)"
            },
            "query_parameters": "All parameters except file may also be passed in the query string"
        }
    })))
}

/// Mounts the service routes; shared by `main` and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/info", web::get().to(info_endpoint))
        .route("/profiles", web::get().to(profiles_endpoint))
        .route("/compress", web::post().to(compress_endpoint));
}
