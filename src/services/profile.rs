// Profile service
// The user's own profile card, avatar and notification toggles. Each is a
// singleton document rather than a record collection.

use serde_json::Value;

use crate::error::CrmError;
use crate::store::{Collection, Storage, StoreError};
use crate::types::{NotificationPrefs, Profile};
use crate::validation::Validator;

/// Largest accepted avatar, measured on the decoded image.
const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;

/// Stored profile, or the defaults when none was saved.
pub fn get_profile(storage: &Storage) -> Profile {
    storage
        .load_document(Collection::ProfileData)
        .unwrap_or_default()
}

/// Validate and store the profile. Name, email and phone are required.
pub fn save_profile(storage: &Storage, mut profile: Profile) -> Result<Profile, CrmError> {
    profile.name = profile.name.trim().to_string();
    profile.email = profile.email.trim().to_string();
    profile.phone = profile.phone.trim().to_string();

    let mut v = Validator::new();
    v.required("name", &profile.name, "Name is required")
        .required("email", &profile.email, "Email is required")
        .optional_email("email", &profile.email, "Please provide a valid email")
        .required("phone", &profile.phone, "Phone is required");
    let errors = v.into_errors();
    if !errors.is_empty() {
        return Err(CrmError::Validation(errors));
    }

    storage.save_document(Collection::ProfileData, &profile)?;
    log::info!("Profile saved");
    Ok(profile)
}

/// Merge `patch` over the current profile, then save it.
pub fn update_profile(storage: &Storage, patch: Value) -> Result<Profile, CrmError> {
    let merged = merge_document(&get_profile(storage), patch)?;
    save_profile(storage, merged)
}

pub fn get_profile_picture(storage: &Storage) -> Option<String> {
    storage.load_raw(Collection::ProfilePicture)
}

/// Store an avatar given as an image data URL (`data:image/png;base64,...`).
pub fn save_profile_picture(storage: &Storage, data_url: &str) -> Result<(), CrmError> {
    let data_url = data_url.trim();
    let Some((header, payload)) = data_url.split_once(',') else {
        return Err(CrmError::validation("picture", "Please select an image file"));
    };
    if !header.starts_with("data:image/") {
        return Err(CrmError::validation("picture", "Please select an image file"));
    }
    // base64 carries 3 bytes per 4 characters
    if payload.len() / 4 * 3 > MAX_PICTURE_BYTES {
        return Err(CrmError::validation(
            "picture",
            "Image size should be less than 5MB",
        ));
    }
    storage.save_raw(Collection::ProfilePicture, data_url)?;
    Ok(())
}

pub fn remove_profile_picture(storage: &Storage) -> Result<bool, CrmError> {
    Ok(storage.remove(Collection::ProfilePicture)?)
}

/// Stored notification settings, or the defaults.
pub fn get_notifications(storage: &Storage) -> NotificationPrefs {
    storage
        .load_document(Collection::Notifications)
        .unwrap_or_default()
}

pub fn save_notifications(storage: &Storage, prefs: NotificationPrefs) -> Result<NotificationPrefs, CrmError> {
    storage.save_document(Collection::Notifications, &prefs)?;
    Ok(prefs)
}

/// Merge `patch` (e.g. `{"sms": true}`) over the current settings.
pub fn update_notifications(storage: &Storage, patch: Value) -> Result<NotificationPrefs, CrmError> {
    let merged = merge_document(&get_notifications(storage), patch)?;
    save_notifications(storage, merged)
}

fn merge_document<T>(current: &T, patch: Value) -> Result<T, CrmError>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let Value::Object(patch) = patch else {
        return Err(CrmError::validation("body", "Request body must be a JSON object"));
    };
    let mut merged = match serde_json::to_value(current).map_err(StoreError::from)? {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for (key, value) in patch {
        if !value.is_null() {
            merged.insert(key, value);
        }
    }
    serde_json::from_value(Value::Object(merged))
        .map_err(|e| CrmError::validation("body", &e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_without_saved_profile() {
        let storage = Storage::in_memory();
        let profile = get_profile(&storage);
        assert_eq!(profile.company, "ClientCore");
        assert_eq!(profile.language, "English");
    }

    #[test]
    fn test_save_requires_phone() {
        let storage = Storage::in_memory();
        let err = save_profile(&storage, Profile::default()).expect_err("no phone");
        match err {
            CrmError::Validation(errors) => assert_eq!(errors[0].field, "phone"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!storage.contains(Collection::ProfileData).expect("contains"));
    }

    #[test]
    fn test_update_profile_merges() {
        let storage = Storage::in_memory();
        let saved = update_profile(
            &storage,
            json!({"name": "Jane Smith", "email": "jane@clientcore.com", "phone": "+1 555"}),
        )
        .expect("save");
        assert_eq!(saved.timezone, "UTC-5 (Eastern Time)");

        let updated = update_profile(&storage, json!({"bio": "Designer"})).expect("update");
        assert_eq!(updated.name, "Jane Smith");
        assert_eq!(updated.bio, "Designer");
        assert_eq!(get_profile(&storage), updated);
    }

    #[test]
    fn test_picture_round_trip_and_remove() {
        let storage = Storage::in_memory();
        save_profile_picture(&storage, "data:image/png;base64,iVBORw0KGgo=").expect("save");
        assert_eq!(
            get_profile_picture(&storage).as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
        assert!(remove_profile_picture(&storage).expect("remove"));
        assert!(get_profile_picture(&storage).is_none());
    }

    #[test]
    fn test_picture_must_be_image() {
        let storage = Storage::in_memory();
        assert!(save_profile_picture(&storage, "data:text/plain;base64,aGk=").is_err());
        assert!(save_profile_picture(&storage, "not a data url").is_err());
    }

    #[test]
    fn test_picture_size_limit() {
        let storage = Storage::in_memory();
        let huge = format!("data:image/png;base64,{}", "A".repeat(8 * 1024 * 1024));
        let err = save_profile_picture(&storage, &huge).expect_err("too big");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_notification_toggle() {
        let storage = Storage::in_memory();
        assert_eq!(get_notifications(&storage), NotificationPrefs::default());
        let prefs = update_notifications(&storage, json!({"sms": true, "email": false})).expect("update");
        assert!(prefs.sms);
        assert!(!prefs.email);
        assert!(prefs.weekly);
        assert_eq!(get_notifications(&storage), prefs);
    }
}
