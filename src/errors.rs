use thiserror::Error;

/// Failures of a single compression call or of a batch.
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("File must be an image (got {0})")]
    InvalidInput(String),

    #[error("Failed to load image: {0}")]
    Decode(String),

    #[error("Failed to compress image: {0}")]
    Encode(String),

    #[error("Invalid compression profile: {0}")]
    InvalidProfile(String),

    #[error("Failed to compress images: {source}")]
    Batch {
        #[source]
        source: Box<CompressionError>,
    },
}

impl CompressionError {
    /// Wraps a member failure as a batch failure.
    pub fn batch(source: CompressionError) -> Self {
        CompressionError::Batch { source: Box::new(source) }
    }

    /// Short machine-readable name used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CompressionError::InvalidInput(_) => "invalid_input",
            CompressionError::Decode(_) => "decode_error",
            CompressionError::Encode(_) => "encode_error",
            CompressionError::InvalidProfile(_) => "invalid_profile",
            CompressionError::Batch { .. } => "batch_compression_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("File too large: maximum size is {max_size} bytes")]
    FileTooLarge { max_size: usize },

    #[error("No file provided in 'file' field")]
    MissingFile,
}

impl actix_web::ResponseError for ServiceError {
    fn error_response(&self) -> actix_web::HttpResponse {
        use actix_web::HttpResponse;

        match self {
            ServiceError::Compression(err) => {
                let mut builder = match err {
                    CompressionError::InvalidInput(_) => HttpResponse::UnsupportedMediaType(),
                    CompressionError::Decode(_) => HttpResponse::UnprocessableEntity(),
                    CompressionError::InvalidProfile(_) => HttpResponse::BadRequest(),
                    CompressionError::Encode(_) | CompressionError::Batch { .. } => {
                        HttpResponse::InternalServerError()
                    }
                };
                builder.json(serde_json::json!({
                    "error": err.kind(),
                    "message": err.to_string()
                }))
            }
            ServiceError::InvalidParameters(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "invalid_parameters",
                    "message": self.to_string()
                }))
            }
            ServiceError::MissingFile => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "missing_file",
                    "message": self.to_string()
                }))
            }
            ServiceError::FileTooLarge { max_size } => {
                HttpResponse::PayloadTooLarge().json(serde_json::json!({
                    "error": "file_too_large",
                    "message": self.to_string(),
                    "max_size_bytes": max_size
                }))
            }
        }
    }
}

/// Errors returned by the studio API client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Session expired or not authorized")]
    Unauthorized,

    #[error("Unexpected response: {0}")]
    Decode(String),
}
