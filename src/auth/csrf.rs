use axum::{
    async_trait,
    body::HttpBody,
    extract::{Form, FromRequest},
    http::{Request, StatusCode},
    response::Response,
    BoxError,
};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use subtle::ConstantTimeEq;

use super::SessionHandle;
use crate::routes::error::client_error;

/// A form that carries the session's CSRF token in a hidden `csrf_token` field.
pub trait CsrfProtected {
    fn csrf_token(&self) -> &str;
}

/// Like [`Form`], but rejects the request with 400 unless the body is a valid
/// form whose CSRF token matches the current session.
pub struct CsrfForm<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for CsrfForm<T>
where
    T: DeserializeOwned + CsrfProtected + Send,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Response;

    async fn from_request(request: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = request.extensions().get::<SessionHandle>().cloned() else {
            warn!("CSRF check on a route without a session");
            return Err(client_error(StatusCode::BAD_REQUEST));
        };

        let Form(form) = Form::<T>::from_request(request, state)
            .await
            .map_err(|rejection| {
                debug!("Malformed form: {}", rejection);
                client_error(StatusCode::BAD_REQUEST)
            })?;

        let Some(expected) = session.expected_csrf_token().await else {
            debug!("Form posted without an established session");
            return Err(client_error(StatusCode::BAD_REQUEST));
        };

        if !tokens_match(&expected, form.csrf_token()) {
            debug!("CSRF token mismatch");
            return Err(client_error(StatusCode::BAD_REQUEST));
        }

        Ok(CsrfForm(form))
    }
}

fn tokens_match(expected: &str, given: &str) -> bool {
    !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(given.as_bytes()))
}
