//! PROFILE: read, update, photo upload.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use consultoria_proto::{
    ErrorCode, ProfileAction, RequestId,
    payloads::profile::{PhotoUploaded, ProfileUpdate},
};
use tracing::info;

use super::{Dispatcher, Failure, Outcome, auth::is_plausible_email, reply};

/// Largest accepted photo, after base64 decoding.
pub(crate) const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

const PHOTO_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub(super) fn handle(
    dispatcher: &Dispatcher,
    request_id: &RequestId,
    user_id: u64,
    action: ProfileAction,
) -> Outcome {
    match action {
        ProfileAction::Get { user_id: target } => {
            let target = target.unwrap_or(user_id);
            let user = dispatcher
                .directory()
                .user(target)
                .ok_or_else(|| Failure::new(ErrorCode::NotFound, "user not found"))?;
            reply(request_id, "profile retrieved", &user.profile())
        },
        ProfileAction::Update(fields) => {
            validate_update(&fields)?;
            let user = dispatcher.directory().update_profile(user_id, &fields)?;
            info!(user_id, "profile updated");
            reply(request_id, "profile updated", &user.profile())
        },
        ProfileAction::UploadPhoto { photo_data, file_name } => {
            let extension = photo_extension(&file_name)
                .ok_or_else(|| Failure::invalid("unsupported photo format"))?;
            let content = STANDARD
                .decode(photo_data.trim())
                .map_err(|_| Failure::invalid("invalid photo data"))?;
            if content.is_empty() {
                return Err(Failure::invalid("photo is empty"));
            }
            if content.len() > MAX_PHOTO_BYTES {
                return Err(Failure::invalid("photo too large"));
            }

            let photo_url = format!("/uploads/profile-photos/user-{user_id}.{extension}");
            let bytes = content.len();
            dispatcher.directory().set_photo(user_id, photo_url.clone(), content)?;

            info!(user_id, bytes, "profile photo replaced");
            reply(request_id, "photo uploaded", &PhotoUploaded { photo_url })
        },
    }
}

fn validate_update(fields: &ProfileUpdate) -> Result<(), Failure> {
    if fields.is_empty() {
        return Err(Failure::invalid("no fields to update"));
    }
    if fields.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(Failure::invalid("name is required"));
    }
    if fields.email.as_deref().is_some_and(|email| !is_plausible_email(email)) {
        return Err(Failure::invalid("invalid email address"));
    }
    Ok(())
}

fn photo_extension(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    PHOTO_EXTENSIONS.contains(&extension.as_str()).then_some(extension)
}
