//! Domain types for user accounts.
//!
//! Newtype identifiers and the pure nickname rules shared by the store and the
//! services. Nothing in here touches the database.

pub mod nickname;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a user account.
///
/// # Examples
///
/// ```rust
/// use microblog::domain::UserId;
///
/// let id = UserId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UserId(i32);

impl UserId {
    /// Creates a new `UserId` from a raw i32 value.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `id` is negative.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        debug_assert!(id >= 0, "UserId should be non-negative");
        Self(id)
    }

    /// Returns the underlying i32 value.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for i32 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<i32> for UserId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for UserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i32::deserialize(deserializer)?;
        Ok(Self::new(id))
    }
}

/// Attributes attested by an identity provider after a successful handshake.
///
/// Either field may be missing; providers are free to ignore attribute requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub email: Option<String>,
    pub nickname: Option<String>,
}

impl IdentityResponse {
    #[must_use]
    pub fn new(email: impl Into<String>, nickname: Option<&str>) -> Self {
        Self {
            email: Some(email.into()),
            nickname: nickname.map(str::to_string),
        }
    }

    /// The attested email, if present and non-blank.
    #[must_use]
    pub fn verified_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}
