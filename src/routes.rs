pub mod auth;
pub mod error;
pub mod middleware;
pub mod snippets;
pub mod users;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir};

use crate::model::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // Only these routes get a session
    let pages = Router::new()
        .route("/", get(snippets::home))
        .route("/snippet/view/:id", get(snippets::view))
        .route(
            "/snippet/create",
            get(snippets::create).post(snippets::create_post),
        )
        .route("/user/signup", get(users::signup).post(users::signup_post))
        .route("/user/login", get(users::login).post(users::login_post))
        .route("/user/logout", post(users::logout_post))
        .route_layer(from_fn_with_state(state.clone(), auth::authenticate));

    let router = Router::new()
        .merge(pages)
        .route("/ping", get(ping))
        .nest_service("/static", ServeDir::new(&state.config.static_dir));

    middleware::with_common_headers(router)
        .layer(from_fn(middleware::log_request))
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .with_state(state)
}

async fn ping() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        model::{user, Session},
    };

    fn test_state() -> Arc<AppState> {
        let config = Config {
            database_path: ":memory:".to_owned(),
            templates_glob: concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*").to_owned(),
            static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/public").to_owned(),
            ..Config::default()
        };
        Arc::new(AppState::build(config).unwrap())
    }

    /// Drives the router like a browser that keeps its session cookie.
    struct Client {
        app: Router,
        cookie: Option<String>,
    }

    impl Client {
        fn new(state: Arc<AppState>) -> Client {
            Client {
                app: router(state),
                cookie: None,
            }
        }

        async fn send(&mut self, request: Request<Body>) -> Response {
            let response = self.app.clone().oneshot(request).await.unwrap();
            if let Some(token) = session_cookie(&response) {
                self.cookie = Some(token);
            }
            response
        }

        async fn get(&mut self, uri: &str) -> Response {
            let mut request = Request::builder().method("GET").uri(uri);
            if let Some(token) = &self.cookie {
                request = request.header(header::COOKIE, format!("session={}", token));
            }
            self.send(request.body(Body::empty()).unwrap()).await
        }

        async fn post_form(&mut self, uri: &str, form: &str) -> Response {
            let mut request = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            if let Some(token) = &self.cookie {
                request = request.header(header::COOKIE, format!("session={}", token));
            }
            self.send(request.body(Body::from(form.to_owned())).unwrap())
                .await
        }

        /// GET a form page and pull the CSRF token out of it.
        async fn csrf_token(&mut self, uri: &str) -> String {
            let response = self.get(uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            csrf_token(&body_string(response).await)
        }
    }

    fn session_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| value.strip_prefix("session="))
            .and_then(|rest| rest.split(';').next())
            .map(str::to_owned)
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn csrf_token(body: &str) -> String {
        let marker = "name=\"csrf_token\" value=\"";
        let start = body.find(marker).expect("page has a CSRF field") + marker.len();
        let end = body[start..].find('"').unwrap();
        body[start..start + end].to_owned()
    }

    async fn signed_up(state: &Arc<AppState>) -> user::Id {
        user::insert(&state.database, "Alice", "alice@example.com", "pa55word")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ping_answers_ok() {
        let mut client = Client::new(test_state());
        let response = client.get("/ping").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn pages_carry_security_headers() {
        let mut client = Client::new(test_state());
        let response = client.get("/").await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
        assert_eq!(headers[header::REFERRER_POLICY], "origin-when-cross-origin");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "deny");
        assert_eq!(headers[header::X_XSS_PROTECTION], "0");
    }

    #[tokio::test]
    async fn static_files_are_served() {
        let mut client = Client::new(test_state());
        let response = client.get("/static/css/main.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn create_snippet_then_view_it() {
        let state = test_state();
        let mut client = Client::new(state.clone());

        let token = client.csrf_token("/snippet/create").await;
        assert!(client.cookie.is_some());

        let response = client
            .post_form(
                "/snippet/create",
                &format!("title=Test&content=Body&expires=1&csrf_token={}", token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response).to_owned();
        assert_eq!(target, "/snippet/view/1");

        let response = client.get(&target).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Test"));
        assert!(body.contains("Body"));
        assert!(body.contains("Snippet successfully created!"));

        // The flash only shows once
        let body = body_string(client.get(&target).await).await;
        assert!(!body.contains("Snippet successfully created!"));

        let body = body_string(client.get("/").await).await;
        assert!(body.contains("/snippet/view/1"));
    }

    #[tokio::test]
    async fn invalid_snippet_form_is_rerendered() {
        let mut client = Client::new(test_state());
        let token = client.csrf_token("/snippet/create").await;

        let response = client
            .post_form(
                "/snippet/create",
                &format!("title=Kept+title&content=&expires=2&csrf_token={}", token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_string(response).await;
        assert!(body.contains("Kept title"));
        assert!(body.contains("This field cannot be blank"));
        assert!(body.contains("This field must equal 1, 7 or 365"));
    }

    #[tokio::test]
    async fn malformed_snippet_form_is_a_bad_request() {
        let mut client = Client::new(test_state());
        let token = client.csrf_token("/snippet/create").await;

        let response = client
            .post_form(
                "/snippet/create",
                &format!("title=a&content=b&expires=soon&csrf_token={}", token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn posts_without_a_csrf_token_are_rejected() {
        let mut client = Client::new(test_state());
        client.csrf_token("/snippet/create").await;

        let response = client
            .post_form("/snippet/create", "title=Test&content=Body&expires=1")
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = client
            .post_form(
                "/snippet/create",
                "title=Test&content=Body&expires=1&csrf_token=forged",
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn posts_without_a_session_are_rejected() {
        let mut client = Client::new(test_state());
        let response = client
            .post_form(
                "/snippet/create",
                "title=Test&content=Body&expires=1&csrf_token=anything",
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_snippet_ids_are_not_found() {
        let state = test_state();
        state
            .database
            .lock()
            .await
            .insert_snippet("Real", "Snippet", 7)
            .unwrap();
        let mut client = Client::new(state);

        for uri in [
            "/snippet/view/abc",
            "/snippet/view/0",
            "/snippet/view/-1",
            "/snippet/view/99",
        ] {
            let response = client.get(uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }

        assert_eq!(client.get("/snippet/view/1").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signup_creates_an_account() {
        let state = test_state();
        let mut client = Client::new(state.clone());
        let token = client.csrf_token("/user/signup").await;

        let response = client
            .post_form(
                "/user/signup",
                &format!(
                    "name=Alice&email=alice%40example.com&password=pa55word&csrf_token={}",
                    token
                ),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/user/login");

        let body = body_string(client.get("/user/login").await).await;
        assert!(body.contains("Your signup was successful. Please log in."));

        let authenticated =
            user::authenticate(&state.database, "alice@example.com", "pa55word").await;
        assert!(authenticated.is_ok());
    }

    #[tokio::test]
    async fn duplicate_signup_is_a_field_error() {
        let state = test_state();
        signed_up(&state).await;
        let mut client = Client::new(state);
        let token = client.csrf_token("/user/signup").await;

        let response = client
            .post_form(
                "/user/signup",
                &format!(
                    "name=Other&email=alice%40example.com&password=secret123&csrf_token={}",
                    token
                ),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_string(response).await;
        assert!(body.contains("Email address is already in use"));
        assert!(body.contains("Other"));
        assert!(!body.contains("secret123"));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_without_a_session() {
        let state = test_state();
        signed_up(&state).await;
        let mut client = Client::new(state.clone());
        let token = client.csrf_token("/user/login").await;
        let session_token = client.cookie.clone().unwrap();

        let response = client
            .post_form(
                "/user/login",
                &format!(
                    "email=alice%40example.com&password=wrong-password&csrf_token={}",
                    token
                ),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(session_cookie(&response).is_none());

        let body = body_string(response).await;
        assert!(body.contains("Email or password is incorrect"));
        assert!(body.contains("alice@example.com"));

        let session = state
            .database
            .lock()
            .await
            .get_session_from_token(&session_token)
            .unwrap()
            .unwrap();
        assert_eq!(session.data.user_id, None);
    }

    #[tokio::test]
    async fn unknown_email_looks_like_a_wrong_password() {
        let state = test_state();
        signed_up(&state).await;
        let mut client = Client::new(state);
        let token = client.csrf_token("/user/login").await;

        let response = client
            .post_form(
                "/user/login",
                &format!(
                    "email=nobody%40example.com&password=pa55word&csrf_token={}",
                    token
                ),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_string(response)
            .await
            .contains("Email or password is incorrect"));
    }

    #[tokio::test]
    async fn login_and_logout_rotate_the_session_token() {
        let state = test_state();
        signed_up(&state).await;
        let mut client = Client::new(state.clone());

        let token = client.csrf_token("/user/login").await;
        let anonymous = client.cookie.clone().unwrap();

        let response = client
            .post_form(
                "/user/login",
                &format!(
                    "email=alice%40example.com&password=pa55word&csrf_token={}",
                    token
                ),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/snippet/create");

        let logged_in = session_cookie(&response).expect("login issues a new token");
        assert_ne!(logged_in, anonymous);
        {
            let database = state.database.lock().await;
            assert!(database.get_session_from_token(&anonymous).unwrap().is_none());
            let session = database.get_session_from_token(&logged_in).unwrap().unwrap();
            assert!(session.data.user_id.is_some());
        }

        // The CSRF token survives the rotation
        let body = body_string(client.get("/").await).await;
        assert!(body.contains("Logout"));
        let token = csrf_token(&body);

        let response = client
            .post_form("/user/logout", &format!("csrf_token={}", token))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let logged_out = session_cookie(&response).expect("logout issues a new token");
        assert_ne!(logged_out, logged_in);
        {
            let database = state.database.lock().await;
            assert!(database.get_session_from_token(&logged_in).unwrap().is_none());
            let session = database.get_session_from_token(&logged_out).unwrap().unwrap();
            assert_eq!(session.data.user_id, None);
        }

        let body = body_string(client.get("/").await).await;
        assert!(body.contains("logged out successfully"));
        assert!(!body.contains("Logout"));
    }

    #[tokio::test]
    async fn deleted_users_are_logged_out() {
        let state = test_state();
        let id = signed_up(&state).await;
        let mut client = Client::new(state.clone());

        let token = client.csrf_token("/user/login").await;
        let response = client
            .post_form(
                "/user/login",
                &format!(
                    "email=alice%40example.com&password=pa55word&csrf_token={}",
                    token
                ),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(body_string(client.get("/").await).await.contains("Logout"));

        state.database.lock().await.delete_user(id).unwrap();

        let body = body_string(client.get("/").await).await;
        assert!(!body.contains("Logout"));
        assert!(body.contains("Login"));

        let session = state
            .database
            .lock()
            .await
            .get_session_from_token(client.cookie.as_deref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(session.data.user_id, None);
    }

    #[tokio::test]
    async fn new_sessions_sweep_out_expired_ones() {
        let state = test_state();
        let mut stale = Session::generate();
        stale.expiry = Utc::now() - Duration::minutes(1);
        state.database.lock().await.save_session(&stale).unwrap();

        let mut client = Client::new(state.clone());
        client.csrf_token("/user/login").await;
        let fresh = client.cookie.clone().unwrap();

        let database = state.database.lock().await;
        assert!(database.get_session_from_token(&stale.token).unwrap().is_none());
        assert!(database.get_session_from_token(&fresh).unwrap().is_some());
    }
}
