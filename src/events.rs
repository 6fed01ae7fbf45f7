//! Event and contact-message calls against the studio API, plus the upload
//! preparation the admin panel does before creating an event.

use log::info;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::ApiClient;
use crate::compression::ImageCompressor;
use crate::errors::{ApiError, CompressionError};
use crate::image_file::ImageFile;
use crate::profile::CompressionProfile;

pub const EVENT_IMAGE_DIR: &str = "/images/events";

const NO_QUERY: &[(&str, &str)] = &[];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "image")]
    pub display_image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Fields the admin form submits for a new or edited event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    pub date: String,
    pub location: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// A compressed image with the storage path it will be uploaded under.
#[derive(Debug, Clone, PartialEq)]
pub struct EventImage {
    pub path: String,
    pub file: ImageFile,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMedia {
    pub display_image: Option<EventImage>,
    pub images: Vec<EventImage>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventList {
    Bare(Vec<Event>),
    Wrapped { events: Vec<Event> },
}

#[derive(Deserialize)]
struct SingleEvent {
    event: Option<Event>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// `/images/events/event_{millis}_{name}`
pub fn event_image_path(file_name: &str, timestamp: SystemTime) -> String {
    let millis = timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}/event_{}_{}", EVENT_IMAGE_DIR, millis, file_name)
}

/// Compresses the display image with the display profile and the gallery
/// with the gallery profile, then assigns storage paths.
pub async fn prepare_event_media(
    compressor: &ImageCompressor,
    display_image: Option<ImageFile>,
    gallery: Vec<ImageFile>,
) -> Result<EventMedia, CompressionError> {
    let display_image = match display_image {
        Some(file) => Some(
            compressor
                .compress(file, &CompressionProfile::display())
                .await?,
        ),
        None => None,
    };
    let gallery = compressor
        .compress_many(gallery, &CompressionProfile::gallery())
        .await?;

    let now = SystemTime::now();
    let to_event_image = |file: ImageFile| EventImage {
        path: event_image_path(&file.name, now),
        file,
    };

    Ok(EventMedia {
        display_image: display_image.map(to_event_image),
        images: gallery.into_iter().map(to_event_image).collect(),
    })
}

fn file_part(image: &EventImage) -> Result<Part, ApiError> {
    let file_name = image
        .path
        .rsplit('/')
        .next()
        .unwrap_or(image.file.name.as_str())
        .to_string();
    Part::bytes(image.file.data.to_vec())
        .file_name(file_name)
        .mime_str(&image.file.mime_type)
        .map_err(ApiError::from)
}

fn event_form(event: &NewEvent, media: &EventMedia) -> Result<Form, ApiError> {
    let mut form = Form::new()
        .text("name", event.name.clone())
        .text("date", event.date.clone())
        .text("location", event.location.clone())
        .text("description", event.description.clone());

    if let Some(display) = &media.display_image {
        form = form.part("displayImage", file_part(display)?);
    }
    for image in &media.images {
        form = form.part("images", file_part(image)?);
    }
    Ok(form)
}

/// Event endpoints of the studio API.
#[derive(Debug, Clone)]
pub struct EventsClient {
    api: ApiClient,
}

impl EventsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn get_all_events(&self) -> Result<Vec<Event>, ApiError> {
        let list: EventList = self.api.public_get("/event/get-all", NO_QUERY).await?;
        Ok(match list {
            EventList::Bare(events) => events,
            EventList::Wrapped { events } => events,
        })
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<Event>, ApiError> {
        let single: SingleEvent = self.api.public_get(&format!("/event/get/{}", id), NO_QUERY).await?;
        Ok(single.event)
    }

    pub async fn create_event(
        &self,
        event: &NewEvent,
        media: &EventMedia,
    ) -> Result<serde_json::Value, ApiError> {
        let form = event_form(event, media)?;
        info!(
            "Creating event '{}' with {} gallery images",
            event.name,
            media.images.len()
        );
        self.api.auth_post_multipart("/event/create", form).await
    }

    pub async fn update_event(
        &self,
        id: &str,
        event: &NewEvent,
    ) -> Result<serde_json::Value, ApiError> {
        self.api.auth_put(&format!("/event/update/{}", id), event).await
    }

    /// Authenticated `DELETE`, where the legacy API took a public POST on
    /// the same path.
    pub async fn delete_event(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        info!("Deleting event {}", id);
        self.api.auth_delete(&format!("/event/delete/{}", id)).await
    }
}

/// Contact form submission.
#[derive(Debug, Clone)]
pub struct ContactClient {
    api: ApiClient,
}

impl ContactClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn send_message(&self, message: &ContactMessage) -> Result<serde_json::Value, ApiError> {
        self.api.public_post("/message/create", message).await
    }
}
