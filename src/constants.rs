pub mod user {

    pub const NICKNAME_MAX_LEN: usize = 64;

    pub const ABOUT_ME_MAX_LEN: usize = 140;

    /// Highest numeric suffix tried when deriving a free nickname.
    pub const MAX_NICKNAME_SUFFIX: u32 = 10_000;

    /// Insert attempts before giving up on a nickname that keeps getting claimed concurrently.
    pub const MAX_PROVISION_ATTEMPTS: u32 = 5;

    pub const FALLBACK_NICKNAME: &str = "user";

    pub const DEFAULT_AVATAR_SIZE: u32 = 128;
}

pub mod session {

    pub const USER_ID: &str = "user_id";

    pub const REMEMBER_ME: &str = "remember_me";

    pub const NEXT: &str = "next";

    /// Provider endpoint the pending login was sent to.
    pub const ENDPOINT: &str = "openid_endpoint";

    pub const FLASHES: &str = "_flashes";
}

pub mod routes {

    pub const INDEX: &str = "/index";

    pub const LOGIN: &str = "/login";

    pub const LOGIN_COMPLETE: &str = "/login/complete";
}

pub mod messages {

    pub const INVALID_LOGIN: &str = "Invalid login. Please try again.";

    pub const NICKNAME_IN_USE: &str = "This nickname is already in use. Please choose another one.";

    pub const PROFILE_SAVED: &str = "Your changes have been saved!";
}
