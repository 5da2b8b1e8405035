//! User profiles keyed by uid, with avatar uploads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    blob::{avatar_path, profile_picture_path},
    document::FieldPatch,
    sync::{FeatureView, SyncError, ValidationError},
    types::{DocId, collections},
};

use super::{Feature, Record};

/// All user profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Profiles;

impl Feature for Profiles {
    const COLLECTION: &'static str = collections::USERS;
    const LABEL: &'static str = "Profile";
    type Record = UserProfile;
}

/// One user's profile document; its id is the user's uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    /// The user's uid.
    #[serde(skip)]
    pub id: DocId,
    /// Display name copied in when the profile was first written.
    pub display_name: String,
    /// Avatar download URL.
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    /// Short free-text bio.
    pub bio: String,
}

impl Record for UserProfile {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

impl FeatureView<Profiles> {
    /// Profile of the signed-in user, if it exists yet.
    pub fn my_profile(&self) -> Option<UserProfile> {
        let uid = self.identity()?.uid;
        self.record(&uid)
    }

    /// Uploads a navbar avatar to `avatars/<uid>` and points the profile at
    /// it, creating the profile when missing. Returns the new URL.
    pub async fn upload_avatar(&mut self, bytes: Vec<u8>) -> Result<String, SyncError> {
        self.replace_photo(bytes, avatar_path).await
    }

    /// Same as [`Self::upload_avatar`] for the profile page's
    /// `profilePictures/<uid>` blob.
    pub async fn upload_profile_picture(&mut self, bytes: Vec<u8>) -> Result<String, SyncError> {
        self.replace_photo(bytes, profile_picture_path).await
    }

    /// Sets the signed-in user's bio.
    pub async fn set_bio(&mut self, bio: &str) -> Result<(), SyncError> {
        let uid = self.signed_in_uid()?;
        self.merge(&uid, FieldPatch::new().with("bio", bio)).await
    }

    async fn replace_photo(&mut self, bytes: Vec<u8>, path_for: fn(&str) -> String) -> Result<String, SyncError> {
        let uid = self.signed_in_uid()?;
        if bytes.is_empty() {
            let err = ValidationError::new("Please choose an image.");
            self.notifier().warning(Profiles::COLLECTION, err.message.clone());
            return Err(err.into());
        }

        let blobs = Arc::clone(self.gateway().blobs());
        let url = match blobs.upload(&path_for(&uid), bytes).await {
            Ok(url) => url,
            Err(err) => {
                self.notifier()
                    .error(Profiles::COLLECTION, format!("Failed to update avatar: {err}"));
                return Err(err.into());
            }
        };

        let mut patch = FieldPatch::new().with("photoURL", url.as_str());
        if !self.mirror().contains(&uid) {
            let name = self.identity().and_then(|who| who.display_name).unwrap_or_default();
            patch = patch.with("displayName", name);
        }
        self.merge(&uid, patch).await?;
        Ok(url)
    }

    fn signed_in_uid(&self) -> Result<String, SyncError> {
        match self.identity() {
            Some(who) => Ok(who.uid),
            None => {
                let err = ValidationError::new("You must be logged in to edit your profile.");
                self.notifier().warning(Profiles::COLLECTION, err.message.clone());
                Err(err.into())
            }
        }
    }
}
