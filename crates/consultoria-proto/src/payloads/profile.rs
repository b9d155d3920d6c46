//! `PROFILE` family: read and update the caller's profile.

use serde::{Deserialize, Serialize};

use super::auth::Role;

/// Operations of the `PROFILE` family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ProfileAction {
    /// Change the fields that are set; unset fields stay as they are.
    Update(ProfileUpdate),
    /// Replace the profile photo.
    UploadPhoto {
        /// Base64-encoded image bytes
        photo_data: String,
        /// Original file name, used for the stored extension
        file_name: String,
    },
    /// Read a profile. `None` reads the caller's own.
    Get {
        /// Profile owner
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<u64>,
    },
}

impl ProfileAction {
    /// Wire name of the operation.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Update(_) => "UPDATE",
            Self::UploadPhoto { .. } => "UPLOAD_PHOTO",
            Self::Get { .. } => "GET",
        }
    }
}

/// Partial profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    /// New display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New contact email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New biography
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// New phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.bio.is_none() && self.phone.is_none()
    }
}

/// `data` of a successful UPDATE or GET.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile owner
    pub user_id: u64,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Marketplace role
    pub role: Role,
    /// Biography
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Location of the current photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// `data` of a successful UPLOAD_PHOTO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploaded {
    /// Location of the stored photo
    pub photo_url: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn update_only_sends_set_fields() {
        let action =
            ProfileAction::Update(ProfileUpdate { bio: Some("Cloud".into()), ..Default::default() });

        assert_eq!(serde_json::to_value(&action).unwrap(), json!({"action": "UPDATE", "bio": "Cloud"}));
    }

    #[test]
    fn get_own_profile_omits_user_id() {
        let own = ProfileAction::Get { user_id: None };
        let other = ProfileAction::Get { user_id: Some(7) };

        assert_eq!(serde_json::to_value(&own).unwrap(), json!({"action": "GET"}));
        assert_eq!(serde_json::to_value(&other).unwrap(), json!({"action": "GET", "userId": 7}));
    }

    #[test]
    fn upload_photo_field_names() {
        let action =
            ProfileAction::UploadPhoto { photo_data: "aGk=".into(), file_name: "me.png".into() };

        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"action": "UPLOAD_PHOTO", "photoData": "aGk=", "fileName": "me.png"})
        );
    }
}
