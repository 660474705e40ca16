//! User identity types.
//!
//! Exactly one [`Identity`] is active at a time. Switching from guest to
//! authenticated is a one-way transition per session; logout returns to a
//! fresh guest identity.

use serde::{Deserialize, Serialize};

use pasar_core::{Email, GuestId, RoleId, UserId};

/// The authenticated user record persisted in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Backend user ID.
    pub id: UserId,
    /// Account email.
    pub email: Email,
    /// Display name.
    pub full_name: String,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Optional profile image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_profile: Option<String>,
    /// Roles reported by the backend, most significant first.
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl UserRecord {
    /// The primary role, when any is known.
    #[must_use]
    pub fn primary_role(&self) -> Option<RoleId> {
        self.roles.first().copied()
    }

    /// Structural validity check applied when restoring a persisted record.
    ///
    /// A record that fails this check is discarded and the session treated as
    /// unauthenticated.
    #[must_use]
    pub fn is_structurally_valid(&self) -> bool {
        self.id.as_i32() > 0
            && Email::parse(self.email.as_str()).is_ok()
            && !self.full_name.is_empty()
    }
}

/// A partial user record for merging into the current identity.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<Email>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub photo_profile: Option<String>,
    pub roles: Option<Vec<RoleId>>,
    /// A replacement token; when absent the previously known token is kept.
    pub token: Option<String>,
}

impl UserPatch {
    /// Merge this patch into an existing record, field by field.
    #[must_use]
    pub fn apply_to(self, mut record: UserRecord) -> UserRecord {
        if let Some(email) = self.email {
            record.email = email;
        }
        if let Some(full_name) = self.full_name {
            record.full_name = full_name;
        }
        if let Some(phone_number) = self.phone_number {
            record.phone_number = Some(phone_number);
        }
        if let Some(photo_profile) = self.photo_profile {
            record.photo_profile = Some(photo_profile);
        }
        if let Some(roles) = self.roles {
            record.roles = roles;
        }
        record
    }
}

/// The result of a backend authentication, handed to
/// [`AuthSession::login`](crate::auth::AuthSession::login).
///
/// The token is optional because the backend's login response shape does not
/// guarantee it; login without a token is a logged no-op.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserRecord,
    pub token: Option<String>,
}

/// The active identity. Owned by the auth session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Unauthenticated visitor. The guest ID is absent until the bootstrapper
    /// has obtained one from the backend.
    Guest { guest_id: Option<GuestId> },
    /// Logged-in user with a bearer token.
    Authenticated { user: UserRecord, token: String },
}

impl Identity {
    /// A fresh guest identity with no server-issued ID yet.
    #[must_use]
    pub const fn empty_guest() -> Self {
        Self::Guest { guest_id: None }
    }

    /// The authenticated user ID, when logged in.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Authenticated { user, .. } => Some(user.id),
            Self::Guest { .. } => None,
        }
    }

    /// Whether this identity is authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_user() -> UserRecord {
        UserRecord {
            id: UserId::new(1),
            email: Email::parse("ana@example.com").unwrap(),
            full_name: "Ana".to_string(),
            phone_number: None,
            photo_profile: None,
            roles: vec![RoleId::new(2)],
        }
    }

    #[test]
    fn test_patch_merges_fields() {
        let patched = UserPatch {
            full_name: Some("Ana Putri".to_string()),
            roles: Some(vec![RoleId::new(1)]),
            ..UserPatch::default()
        }
        .apply_to(sample_user());

        assert_eq!(patched.full_name, "Ana Putri");
        assert_eq!(patched.roles, vec![RoleId::new(1)]);
        // Untouched fields survive
        assert_eq!(patched.email.as_str(), "ana@example.com");
    }

    #[test]
    fn test_structural_validity() {
        assert!(sample_user().is_structurally_valid());

        let mut bad = sample_user();
        bad.full_name = String::new();
        assert!(!bad.is_structurally_valid());
    }

    #[test]
    fn test_invalid_email_rejected_on_restore() {
        // A transparently deserialized record can carry a malformed email;
        // structural validation catches it.
        let json = r#"{"id":1,"email":"not-an-email","fullName":"Ana"}"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_structurally_valid());
    }

    #[test]
    fn test_identity_user_id() {
        assert_eq!(Identity::empty_guest().user_id(), None);
        let identity = Identity::Authenticated {
            user: sample_user(),
            token: "t".to_string(),
        };
        assert_eq!(identity.user_id(), Some(UserId::new(1)));
        assert!(identity.is_authenticated());
    }
}
