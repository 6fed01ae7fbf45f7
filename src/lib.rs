pub mod api;
pub mod compression;
pub mod config;
pub mod dimensions;
pub mod errors;
pub mod events;
pub mod format;
pub mod handlers;
pub mod image_file;
pub mod profile;
pub mod session;

// Re-export commonly used items for easier testing
pub use compression::{compress_image, compress_images, ImageCompressor};
pub use config::Config;
pub use dimensions::calculate_dimensions;
pub use errors::*;
pub use format::format_file_size;
pub use image_file::ImageFile;
pub use profile::{
    get_display_image_settings, get_gallery_image_settings, CompressionProfile, OutputType,
};
pub use session::{Session, SessionContext};
