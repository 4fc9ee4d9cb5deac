use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use axum_macros::debug_handler;
use log::info;

use super::error::AppError;
use crate::{
    auth::{
        csrf::{CsrfForm, CsrfProtected},
        SessionHandle,
    },
    model::{user, AppState, Error},
    templates,
    validator::{self, Validator, EMAIL_RX},
};

const BLANK: &str = "This field cannot be blank";
const BAD_EMAIL: &str = "This field must be a valid email address";

#[derive(Default, serde::Deserialize, serde::Serialize)]
pub struct UserSignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// The (**unhashed**) password. Never echoed back into the page.
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub csrf_token: String,
}

impl core::fmt::Debug for UserSignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't print the password
        f.debug_struct("UserSignupForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish()
    }
}

impl CsrfProtected for UserSignupForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

impl UserSignupForm {
    fn validate(&self, validator: &mut Validator) {
        validator.check_field(validator::not_blank(&self.name), "name", BLANK);
        validator.check_field(validator::not_blank(&self.email), "email", BLANK);
        validator.check_field(validator::matches(&self.email, &EMAIL_RX), "email", BAD_EMAIL);
        validator.check_field(validator::not_blank(&self.password), "password", BLANK);
        validator.check_field(
            validator::min_chars(&self.password, 8),
            "password",
            "This field must be at least 8 characters long",
        );
    }
}

#[derive(Default, serde::Deserialize, serde::Serialize)]
pub struct UserLoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub csrf_token: String,
}

impl core::fmt::Debug for UserLoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't print the password
        f.debug_struct("UserLoginForm")
            .field("email", &self.email)
            .finish()
    }
}

impl CsrfProtected for UserLoginForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

impl UserLoginForm {
    fn validate(&self, validator: &mut Validator) {
        validator.check_field(validator::not_blank(&self.email), "email", BLANK);
        validator.check_field(validator::matches(&self.email, &EMAIL_RX), "email", BAD_EMAIL);
        validator.check_field(validator::not_blank(&self.password), "password", BLANK);
    }
}

#[debug_handler]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, AppError> {
    let mut context = templates::template_data(&session).await;
    context.insert("form", &UserSignupForm::default());
    context.insert("validator", &Validator::new());
    templates::render(&state.templates, StatusCode::OK, "signup.html", &context)
}

#[debug_handler]
pub async fn signup_post(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    CsrfForm(form): CsrfForm<UserSignupForm>,
) -> Result<Response, AppError> {
    let mut validator = Validator::new();
    form.validate(&mut validator);

    if validator.valid() {
        let result =
            user::insert(&state.database, &form.name, &form.email, &form.password).await;

        match result {
            Ok(id) => {
                info!("Created user {}", id);
                session
                    .put_flash("Your signup was successful. Please log in.")
                    .await;
                return Ok(Redirect::to("/user/login").into_response());
            }
            Err(Error::DuplicateEmail) => {
                validator.add_field_error("email", "Email address is already in use");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let mut context = templates::template_data(&session).await;
    context.insert("form", &form);
    context.insert("validator", &validator);
    templates::render(
        &state.templates,
        StatusCode::UNPROCESSABLE_ENTITY,
        "signup.html",
        &context,
    )
}

#[debug_handler]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, AppError> {
    let mut context = templates::template_data(&session).await;
    context.insert("form", &UserLoginForm::default());
    context.insert("validator", &Validator::new());
    templates::render(&state.templates, StatusCode::OK, "login.html", &context)
}

#[debug_handler]
pub async fn login_post(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    CsrfForm(form): CsrfForm<UserLoginForm>,
) -> Result<Response, AppError> {
    let mut validator = Validator::new();
    form.validate(&mut validator);

    if validator.valid() {
        let result = user::authenticate(&state.database, &form.email, &form.password).await;

        match result {
            Ok(id) => {
                // New privileges, new token
                session.renew_token().await;
                session.put_user_id(id).await;
                info!("User {} logged in", id);
                return Ok(Redirect::to("/snippet/create").into_response());
            }
            Err(Error::InvalidCredentials) => {
                validator.add_non_field_error("Email or password is incorrect");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let mut context = templates::template_data(&session).await;
    context.insert("form", &form);
    context.insert("validator", &validator);
    templates::render(
        &state.templates,
        StatusCode::UNPROCESSABLE_ENTITY,
        "login.html",
        &context,
    )
}

#[debug_handler]
pub async fn logout_post(
    Extension(session): Extension<SessionHandle>,
    CsrfForm(_form): CsrfForm<LogoutForm>,
) -> Response {
    if let Some(id) = session.user_id().await {
        info!("User {} logged out", id);
    }

    session.renew_token().await;
    session.remove_user_id().await;
    session.put_flash("You've been logged out successfully!").await;

    Redirect::to("/").into_response()
}

/// The logout button posts nothing but the CSRF token.
#[derive(Debug, serde::Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    csrf_token: String,
}

impl CsrfProtected for LogoutForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}
