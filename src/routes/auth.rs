use std::sync::Arc;

use axum::{
    extract::{State, TypedHeader},
    headers::Cookie,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use log::{debug, trace};

use super::error::AppError;
use crate::{
    auth::{self, session::Commit, SessionHandle},
    model::{AppState, Session},
};

pub const COOKIE_NAME: &str = "session";

/// Attach the caller's session to the request, then store whatever the
/// handler changed and hand out the (possibly new) token.
pub async fn authenticate<B>(
    State(state): State<Arc<AppState>>,
    cookies: Option<TypedHeader<Cookie>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = cookies
        .as_ref()
        .and_then(|TypedHeader(cookies)| cookies.get(COOKIE_NAME));

    let session = match token {
        Some(token) => {
            let database = state.database.lock().await;
            match auth::verify_session(token, &database) {
                Ok(session) => Some(session),
                Err(auth::verify_session::Error::Database(err)) => return Err(err.into()),
                Err(_) => None,
            }
        }
        None => {
            trace!("No session cookie found");
            None
        }
    };

    let is_new = session.is_none();
    let handle = match session {
        Some(session) => SessionHandle::existing(session),
        None => SessionHandle::fresh(Session::generate()),
    };

    // The account behind a session might be gone
    if let Some(user_id) = handle.user_id().await {
        let exists = state.database.lock().await.user_exists(user_id)?;
        if !exists {
            debug!("Session refers to missing user {}, logging it out", user_id);
            handle.remove_user_id().await;
        }
    }

    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let Commit { delete, save } = handle.commit().await;
    {
        let database = state.database.lock().await;
        if let Some(stale) = delete {
            database.delete_session(&stale)?;
        }
        if let Some(session) = &save {
            database.save_session(session)?;

            // Abandoned sessions are never presented again, so sweep them
            // whenever a new one joins the table
            if is_new {
                let purged = database.delete_expired_sessions()?;
                if purged > 0 {
                    debug!("Purged {} expired sessions", purged);
                }
            }
        }
    }

    if let Some(session) = save {
        let cookie = make_cookie(&session, state.config.secure_cookies);
        let headers = response.headers_mut();
        headers.append(header::SET_COOKIE, HeaderValue::from_str(&cookie)?);
        headers.append(header::VARY, HeaderValue::from_static("Cookie"));
    }

    Ok(response)
}

fn make_cookie(session: &Session, secure: bool) -> String {
    let max_age = (session.expiry - Utc::now()).num_seconds().max(0);

    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        COOKIE_NAME,
        session.token,
        max_age,
        if secure { "; Secure" } else { "" },
    )
}
