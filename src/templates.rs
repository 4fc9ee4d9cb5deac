use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Datelike, Utc};
use tera::{Context, Tera, Value};

use crate::{auth::SessionHandle, routes::error::AppError};

/// Load and parse every template matching `glob`, once, at startup.
pub fn build(glob: &str) -> tera::Result<Tera> {
    let mut templates = Tera::new(glob)?;
    templates.register_filter("human_date", human_date);
    Ok(templates)
}

/// The context every page starts from.
///
/// Pops the flash message, so only call this when a page is actually rendered.
pub async fn template_data(session: &SessionHandle) -> Context {
    let mut context = Context::new();
    context.insert("current_year", &Utc::now().year());
    context.insert("flash", &session.pop_flash().await);
    context.insert("is_authenticated", &session.is_authenticated().await);
    context.insert("csrf_token", &session.csrf_token().await);
    context
}

/// Render `page` fully before answering, so a template error becomes a clean 500.
pub fn render(
    templates: &Tera,
    status: StatusCode,
    page: &str,
    context: &Context,
) -> Result<Response, AppError> {
    let rendered = templates.render(page, context)?;
    Ok((status, Html(rendered)).into_response())
}

pub fn format_human_date(time: DateTime<Utc>) -> String {
    time.format("%d %b %Y at %H:%M").to_string()
}

/// Tera filter: `{{ snippet.created | human_date }}`.
fn human_date(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = tera::try_get_value!("human_date", "value", String, value);
    let time = DateTime::parse_from_rfc3339(&raw)
        .map_err(|err| tera::Error::msg(format!("human_date: {:?} is not a timestamp: {}", raw, err)))?;

    Ok(Value::String(format_human_date(time.with_timezone(&Utc))))
}
