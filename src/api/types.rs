use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::OpenIdProviderConfig;
use crate::constants::user::DEFAULT_AVATAR_SIZE;
use crate::db::User;
use crate::domain::UserId;
use crate::services::Post;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-field messages for rejected form submissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            fields: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            fields: None,
        }
    }

    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![message.clone()]);

        Self {
            success: false,
            data: None,
            error: Some(message),
            fields: Some(fields),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: UserId,
    pub nickname: String,
    pub about_me: Option<String>,
    pub last_seen: Option<String>,
    pub avatar: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname.clone(),
            about_me: user.about_me.clone(),
            last_seen: user.last_seen.clone(),
            avatar: user.avatar(DEFAULT_AVATAR_SIZE),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TimelineDto {
    pub user: UserDto,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub struct EditFormDto {
    pub nickname: String,
    pub about_me: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginPageDto {
    pub providers: Vec<OpenIdProviderConfig>,
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlashesDto {
    pub messages: Vec<String>,
}
