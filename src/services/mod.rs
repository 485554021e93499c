pub mod auth_service;
pub mod auth_service_impl;
pub mod profile_service;
pub mod profile_service_impl;
pub mod timeline;

pub use auth_service::{AuthError, AuthService, LoginOutcome};
pub use auth_service_impl::SeaOrmAuthService;
pub use profile_service::{ProfileError, ProfileService, ProfileUpdate};
pub use profile_service_impl::SeaOrmProfileService;
pub use timeline::Post;
