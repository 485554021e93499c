use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::flash::flash;
use super::{ApiError, ApiResponse, AppState, EditFormDto, TimelineDto, UserDto};
use crate::constants::{messages, routes};
use crate::services::timeline::{home_timeline, user_timeline};
use crate::services::{ProfileError, ProfileUpdate};

/// GET / and GET /index
pub async fn index(CurrentUser(user): CurrentUser) -> Json<ApiResponse<TimelineDto>> {
    Json(ApiResponse::success(TimelineDto {
        user: UserDto::from(&user),
        posts: home_timeline(),
    }))
}

/// GET /user/{nickname}
pub async fn user_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(nickname): Path<String>,
) -> Result<Response, ApiError> {
    match state.profile_service().get_profile(&nickname).await {
        Ok(user) => Ok(Json(ApiResponse::success(TimelineDto {
            user: UserDto::from(&user),
            posts: user_timeline(&user),
        }))
        .into_response()),
        Err(ProfileError::NotFound(_)) => {
            flash(&session, format!("User {nickname} not found.")).await?;
            Ok(Redirect::to(routes::INDEX).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /edit
/// Current values for the profile form
pub async fn edit_form(CurrentUser(user): CurrentUser) -> Json<ApiResponse<EditFormDto>> {
    Json(ApiResponse::success(EditFormDto {
        nickname: user.nickname,
        about_me: user.about_me,
    }))
}

/// POST /edit
pub async fn edit_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let updated = state.profile_service().update_profile(&user, update).await?;

    flash(&session, messages::PROFILE_SAVED).await?;
    tracing::info!(user_id = %updated.id, nickname = %updated.nickname, "Profile updated");

    Ok(Json(ApiResponse::success(UserDto::from(&updated))))
}
