// handlers/elevated/end.rs - POST /tenant-access/impersonate/end
//                            POST /tenant-access/secure-login/end

use axum::extract::State;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::handlers::views::SessionView;
use crate::middleware::cookies::session_token;
use crate::middleware::{clear_session_cookie, set_session_cookie, ApiResponse};

#[derive(Debug, Serialize)]
pub struct EndView {
    /// An elevated session was revoked by this request
    pub ended: bool,
    pub redirect_to: String,
    /// Normal session restored for the original principal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

/// Idempotent: calling it again after the session has ended still answers 200
pub async fn end_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<EndView>), ApiError> {
    let token = session_token(&headers, &jar);
    let outcome = state.gate().end_elevated_session(token.as_deref()).await?;

    let jar = match &outcome.restored {
        Some(restored) => set_session_cookie(jar, &restored.issued.token, state.cookie_secure()),
        None if outcome.clear_cookie => clear_session_cookie(jar, state.cookie_secure()),
        None => jar,
    };
    let session = outcome
        .restored
        .as_ref()
        .map(|restored| SessionView::new(&restored.issued, &restored.user));

    Ok((
        jar,
        ApiResponse::success(EndView {
            ended: outcome.ended,
            redirect_to: outcome.redirect_to,
            session,
        }),
    ))
}
