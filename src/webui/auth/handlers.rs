use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use garde::Validate;
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info, warn};

use crate::config::LinkedInConfig;
use crate::webui::error::{ApiError, ApiResult};

use super::dto::{LinkedInCallbackQuery, LinkedInCallbackResponse};
use super::state_store::StateStore;
use super::AuthState;

pub const LINKEDIN_AUTHORIZE_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";

/// Cookie binding the issued `state` to the browser that started the flow.
pub const STATE_COOKIE: &str = "linkedin_oauth_state";
const STATE_COOKIE_PATH: &str = "/api/auth/linkedin";

/// 128 bits of entropy, 32 hex characters once encoded.
const STATE_BYTES: usize = 16;

/// Fresh anti-forgery token from the OS CSPRNG, lowercase hex.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Provider authorization URL. Parameter order is fixed and every value is percent-encoded.
pub fn authorization_url(config: &LinkedInConfig, state: &str) -> String {
    format!(
        "{LINKEDIN_AUTHORIZE_URL}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scopes),
        urlencoding::encode(state),
    )
}

fn state_cookie(value: &str, secure: bool, ttl: Duration) -> Cookie<'static> {
    let max_age = time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX);
    Cookie::build((STATE_COOKIE, value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(STATE_COOKIE_PATH)
        .max_age(max_age)
        .build()
}

pub async fn linkedin_authorize(State(state): State<Arc<AuthState>>, jar: CookieJar) -> Response {
    let token = generate_state();
    state.pending.insert(token.clone()).await;

    let url = authorization_url(&state.config, &token);
    debug!(state_prefix = &token[..8], "Redirecting to LinkedIn authorization");

    let jar = jar.add(state_cookie(
        &token,
        state.config.secure_cookies(),
        state.pending.ttl(),
    ));
    (StatusCode::FOUND, jar, [(header::LOCATION, url)]).into_response()
}

/// Every response clears the state cookie, including rejections of a malformed query.
pub async fn linkedin_callback(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    query: Result<Query<LinkedInCallbackQuery>, QueryRejection>,
) -> (CookieJar, ApiResult<Json<LinkedInCallbackResponse>>) {
    let cookie_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH));

    let query = query.map(|Query(query)| query);
    let result = verify_callback(&state.pending, cookie_state.as_deref(), query).await;
    (jar, result)
}

async fn verify_callback(
    pending: &StateStore,
    cookie_state: Option<&str>,
    query: Result<LinkedInCallbackQuery, QueryRejection>,
) -> ApiResult<Json<LinkedInCallbackResponse>> {
    // Every token this request presents is burned before anything is checked,
    // so no presentation can be replayed, however it is rejected.
    let query_state = query.as_ref().ok().map(|q| q.state.as_str());
    let issued = match query_state {
        Some(state) => pending.take(state).await,
        None => false,
    };
    if let Some(cookie) = cookie_state.filter(|c| Some(*c) != query_state) {
        pending.take(cookie).await;
    }

    let query = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    query
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if cookie_state != Some(query.state.as_str()) {
        warn!("LinkedIn callback state does not match the browser cookie");
        return Err(ApiError::BadRequest("OAuth state mismatch".to_string()));
    }

    if !issued {
        warn!("LinkedIn callback presented an unknown or expired state");
        return Err(ApiError::BadRequest(
            "Invalid or expired OAuth state".to_string(),
        ));
    }

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        warn!(error = %error, description = %description, "LinkedIn authorization denied");
        return Err(ApiError::BadRequest(format!(
            "LinkedIn authorization failed: {error} {description}"
        )
        .trim_end()
        .to_string()));
    }

    let code = query
        .code
        .ok_or_else(|| ApiError::BadRequest("Missing authorization code".to_string()))?;

    info!(code_len = code.len(), "LinkedIn callback verified");
    Ok(Json(LinkedInCallbackResponse { ok: true }))
}
