//! One-shot messages carried in the session to the next response.

use axum::Json;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, FlashesDto};
use crate::constants::session::FLASHES;

pub async fn flash(session: &Session, message: impl Into<String>) -> Result<(), ApiError> {
    let mut messages: Vec<String> = session.get(FLASHES).await?.unwrap_or_default();
    messages.push(message.into());
    session.insert(FLASHES, messages).await?;
    Ok(())
}

pub async fn take_flashes(session: &Session) -> Result<Vec<String>, ApiError> {
    Ok(session
        .remove::<Vec<String>>(FLASHES)
        .await?
        .unwrap_or_default())
}

/// GET /flashes
pub async fn get_flashes(session: Session) -> Result<Json<ApiResponse<FlashesDto>>, ApiError> {
    let messages = take_flashes(&session).await?;
    Ok(Json(ApiResponse::success(FlashesDto { messages })))
}
