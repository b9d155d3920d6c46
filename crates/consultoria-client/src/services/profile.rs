//! Profile service.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use consultoria_proto::{
    ProfileAction,
    payloads::profile::{PhotoUploaded, Profile, ProfileUpdate},
};
use tracing::debug;

use crate::{env::Environment, error::SessionError, session::SessionLayer, transport::Transport};

/// Profile reads and updates. Failures pass through from the layer; refusals
/// become [`SessionError::Rejected`].
pub struct ProfileService<T: Transport, E: Environment> {
    layer: Arc<SessionLayer<T, E>>,
}

impl<T: Transport, E: Environment> ProfileService<T, E> {
    /// Service over `layer`.
    pub fn new(layer: Arc<SessionLayer<T, E>>) -> Self {
        Self { layer }
    }

    /// Change the set fields of the caller's profile.
    pub async fn update(&self, fields: ProfileUpdate) -> Result<Profile, SessionError> {
        let response = self.layer.send(ProfileAction::Update(fields).into()).await?;
        super::decode(response, "Profile")
    }

    /// Replace the caller's photo. `content` is sent base64-encoded.
    pub async fn upload_photo(
        &self,
        file_name: &str,
        content: &[u8],
    ) -> Result<PhotoUploaded, SessionError> {
        debug!(file_name, bytes = content.len(), "uploading photo");
        let action = ProfileAction::UploadPhoto {
            photo_data: STANDARD.encode(content),
            file_name: file_name.to_string(),
        };

        let response = self.layer.send(action.into()).await?;
        super::decode(response, "PhotoUploaded")
    }

    /// Read a profile; `None` reads the caller's own.
    pub async fn get(&self, user_id: Option<u64>) -> Result<Profile, SessionError> {
        let response = self.layer.send(ProfileAction::Get { user_id }.into()).await?;
        super::decode(response, "Profile")
    }
}
