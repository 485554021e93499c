//! `SeaORM` implementation of the `ProfileService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::constants::user::{ABOUT_ME_MAX_LEN, NICKNAME_MAX_LEN};
use crate::db::{Store, User};
use crate::domain::nickname::char_len;
use crate::services::profile_service::{ProfileError, ProfileService, ProfileUpdate};

pub struct SeaOrmProfileService {
    store: Store,
}

impl SeaOrmProfileService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

/// Trims and length-checks the form, returning `(nickname, about_me)`.
fn validate_update(update: &ProfileUpdate) -> Result<(String, Option<String>), ProfileError> {
    let nickname = update.nickname.trim();

    if nickname.is_empty() {
        return Err(ProfileError::validation("nickname", "This field is required."));
    }

    if char_len(nickname) > NICKNAME_MAX_LEN {
        return Err(ProfileError::validation(
            "nickname",
            format!("Nickname must be {NICKNAME_MAX_LEN} characters or less."),
        ));
    }

    let about_me = update
        .about_me
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    if about_me.is_some_and(|a| char_len(a) > ABOUT_ME_MAX_LEN) {
        return Err(ProfileError::validation(
            "about_me",
            format!("Field must be between 0 and {ABOUT_ME_MAX_LEN} characters long."),
        ));
    }

    Ok((nickname.to_string(), about_me.map(str::to_string)))
}

#[async_trait]
impl ProfileService for SeaOrmProfileService {
    async fn get_profile(&self, nickname: &str) -> Result<User, ProfileError> {
        self.store
            .get_user_by_nickname(nickname)
            .await?
            .ok_or_else(|| ProfileError::NotFound(nickname.to_string()))
    }

    async fn update_profile(
        &self,
        current: &User,
        update: ProfileUpdate,
    ) -> Result<User, ProfileError> {
        let (nickname, about_me) = validate_update(&update)?;

        let user = self
            .store
            .update_user_profile(current.id, &nickname, about_me.as_deref())
            .await?;

        if user.nickname != current.nickname {
            info!(user_id = %user.id, from = %current.nickname, to = %user.nickname, "Nickname changed");
        }

        Ok(user)
    }
}
