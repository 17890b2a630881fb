//! Authenticated identity and stored user profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Identity returned by the auth provider for a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl AuthUser {
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            full_name: None,
        }
    }
}

/// Profile row mirrored from the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&AuthUser> for UserProfile {
    /// Profile built from token claims alone, used when nothing is stored.
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar_url: None,
            phone: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Payload for `PUT /user/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Merge into an existing profile (or the token-derived one) and stamp
    /// `updated_at`.
    #[must_use]
    pub fn merge_into(self, mut profile: UserProfile, now: DateTime<Utc>) -> UserProfile {
        if self.full_name.is_some() {
            profile.full_name = self.full_name;
        }
        if self.avatar_url.is_some() {
            profile.avatar_url = self.avatar_url;
        }
        if self.phone.is_some() {
            profile.phone = self.phone;
        }
        profile.created_at.get_or_insert(now);
        profile.updated_at = Some(now);
        profile
    }
}
