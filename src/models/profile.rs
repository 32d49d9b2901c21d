//! User profile model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::auth::provider::Identity;

/// Age bucket a learner falls into. Determines which lesson track and
/// tone of voice the frontend presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AgeGroup {
    #[serde(rename = "5-9")]
    Young,
    #[serde(rename = "10-14")]
    Tween,
    #[serde(rename = "15-19")]
    Teen,
}

impl AgeGroup {
    /// Bucket for a given age. Ages outside 5-19 clamp to the nearest bucket.
    pub fn for_age(age: u8) -> Self {
        match age {
            0..=9 => AgeGroup::Young,
            10..=14 => AgeGroup::Tween,
            _ => AgeGroup::Teen,
        }
    }
}

impl Default for AgeGroup {
    fn default() -> Self {
        AgeGroup::Tween
    }
}

/// Fallback age when signup metadata carries none.
pub const DEFAULT_AGE: u8 = 12;

/// User profile row in the `users` table.
///
/// Created at signup, or lazily from identity metadata the first time the
/// assembled user is fetched and no row exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Identity id from the auth provider (also the row key)
    pub id: String,
    /// Display name
    pub name: String,
    /// Age in years (5-19)
    pub age: u8,
    /// Derived age bucket
    pub age_group: AgeGroup,
    /// Avatar identifier (may be empty)
    #[serde(default)]
    pub avatar: String,
    /// Row creation timestamp (RFC 3339), set by the store
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
}

impl Profile {
    /// Synthesize a profile from identity metadata.
    ///
    /// Name falls back to the email local-part, then "User". Age falls back
    /// to 12 with the matching middle bucket.
    pub fn from_identity(identity: &Identity) -> Self {
        let meta = &identity.metadata;

        let name = meta
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| {
                identity
                    .email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string());

        let age = meta.age.unwrap_or(DEFAULT_AGE);
        let age_group = meta.age_group.unwrap_or_else(|| AgeGroup::for_age(age));

        Self {
            id: identity.id.clone(),
            name,
            age,
            age_group,
            avatar: meta.avatar.clone().unwrap_or_default(),
            created_at: String::new(),
        }
    }
}

/// Partial profile update. Fields left as `None` are not written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<AgeGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    /// True if no field is set (nothing to write).
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.age_group.is_none()
            && self.avatar.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{Identity, IdentityMetadata};

    fn identity_with(metadata: IdentityMetadata, email: Option<&str>) -> Identity {
        Identity {
            id: "user-1".to_string(),
            email: email.map(str::to_string),
            email_confirmed: true,
            metadata,
        }
    }

    #[test]
    fn test_age_bucketing() {
        assert_eq!(AgeGroup::for_age(5), AgeGroup::Young);
        assert_eq!(AgeGroup::for_age(9), AgeGroup::Young);
        assert_eq!(AgeGroup::for_age(10), AgeGroup::Tween);
        assert_eq!(AgeGroup::for_age(14), AgeGroup::Tween);
        assert_eq!(AgeGroup::for_age(15), AgeGroup::Teen);
        assert_eq!(AgeGroup::for_age(19), AgeGroup::Teen);
    }

    #[test]
    fn test_from_identity_uses_metadata() {
        let meta = IdentityMetadata {
            name: Some("Maya".to_string()),
            age: Some(8),
            age_group: None,
            avatar: Some("fox".to_string()),
        };
        let profile = Profile::from_identity(&identity_with(meta, Some("maya@example.com")));

        assert_eq!(profile.name, "Maya");
        assert_eq!(profile.age, 8);
        assert_eq!(profile.age_group, AgeGroup::Young);
        assert_eq!(profile.avatar, "fox");
    }

    #[test]
    fn test_from_identity_defaults() {
        let profile = Profile::from_identity(&identity_with(
            IdentityMetadata::default(),
            Some("sam.r@example.com"),
        ));

        assert_eq!(profile.name, "sam.r");
        assert_eq!(profile.age, DEFAULT_AGE);
        assert_eq!(profile.age_group, AgeGroup::Tween);
        assert_eq!(profile.avatar, "");
    }

    #[test]
    fn test_from_identity_without_email_falls_back_to_user() {
        let profile = Profile::from_identity(&identity_with(IdentityMetadata::default(), None));
        assert_eq!(profile.name, "User");
    }

    #[test]
    fn test_age_group_wire_format() {
        let json = serde_json::to_string(&AgeGroup::Tween).unwrap();
        assert_eq!(json, "\"10-14\"");
        let parsed: AgeGroup = serde_json::from_str("\"15-19\"").unwrap();
        assert_eq!(parsed, AgeGroup::Teen);
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            name: Some("New Name".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"name": "New Name"}));
    }
}
