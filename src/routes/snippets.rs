use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use axum_macros::debug_handler;
use log::{debug, info};

use super::error::{client_error, AppError};
use crate::{
    auth::{
        csrf::{CsrfForm, CsrfProtected},
        SessionHandle,
    },
    model::{snippet, AppState, Error},
    templates,
    validator::{self, Validator},
};

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct SnippetCreateForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Days until the snippet expires. Missing means 0, which fails validation.
    #[serde(default)]
    pub expires: i64,
    #[serde(default, skip_serializing)]
    pub csrf_token: String,
}

impl Default for SnippetCreateForm {
    fn default() -> Self {
        SnippetCreateForm {
            title: String::new(),
            content: String::new(),
            expires: 365,
            csrf_token: String::new(),
        }
    }
}

impl CsrfProtected for SnippetCreateForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

impl SnippetCreateForm {
    fn validate(&self, validator: &mut Validator) {
        validator.check_field(
            validator::not_blank(&self.title),
            "title",
            "This field cannot be blank",
        );
        validator.check_field(
            validator::max_chars(&self.title, 100),
            "title",
            "This field cannot be more than 100 characters long",
        );
        validator.check_field(
            validator::not_blank(&self.content),
            "content",
            "This field cannot be blank",
        );
        validator.check_field(
            validator::permitted_value(self.expires, &snippet::PERMITTED_EXPIRY_DAYS),
            "expires",
            "This field must equal 1, 7 or 365",
        );
    }
}

#[debug_handler]
pub async fn home(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, AppError> {
    let snippets = state.database.lock().await.latest_snippets()?;

    let mut context = templates::template_data(&session).await;
    context.insert("snippets", &snippets);
    templates::render(&state.templates, StatusCode::OK, "home.html", &context)
}

#[debug_handler]
pub async fn view(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let Some(id) = parse_id(&id) else {
        debug!("Rejecting malformed snippet id {:?}", id);
        return Ok(client_error(StatusCode::NOT_FOUND));
    };

    let result = state.database.lock().await.get_snippet(id);
    let snippet = match result {
        Ok(snippet) => snippet,
        Err(Error::NoRecord) => return Ok(client_error(StatusCode::NOT_FOUND)),
        Err(err) => return Err(err.into()),
    };

    let mut context = templates::template_data(&session).await;
    context.insert("snippet", &snippet);
    templates::render(&state.templates, StatusCode::OK, "view.html", &context)
}

#[debug_handler]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, AppError> {
    let mut context = templates::template_data(&session).await;
    context.insert("form", &SnippetCreateForm::default());
    context.insert("validator", &Validator::new());
    templates::render(&state.templates, StatusCode::OK, "create.html", &context)
}

#[debug_handler]
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    CsrfForm(form): CsrfForm<SnippetCreateForm>,
) -> Result<Response, AppError> {
    let mut validator = Validator::new();
    form.validate(&mut validator);

    if !validator.valid() {
        let mut context = templates::template_data(&session).await;
        context.insert("form", &form);
        context.insert("validator", &validator);
        return templates::render(
            &state.templates,
            StatusCode::UNPROCESSABLE_ENTITY,
            "create.html",
            &context,
        );
    }

    let id = state
        .database
        .lock()
        .await
        .insert_snippet(&form.title, &form.content, form.expires)?;
    info!("Created snippet {}", id);

    session.put_flash("Snippet successfully created!").await;

    Ok(Redirect::to(&format!("/snippet/view/{}", id)).into_response())
}

/// Ids are positive integers; anything else can't name a snippet.
fn parse_id(raw: &str) -> Option<snippet::Id> {
    raw.parse::<snippet::Id>().ok().filter(|id| *id >= 1)
}
