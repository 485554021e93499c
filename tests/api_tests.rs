use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use url::{Url, form_urlencoded};

use microblog::api::AppState;
use microblog::clients::{Attribute, IdentityError, IdentityProvider};
use microblog::config::Config;
use microblog::constants::messages;
use microblog::domain::IdentityResponse;

/// Stands in for a real provider: `complete` trusts the callback query as long as it
/// names the endpoint the login was started with.
struct FakeProvider;

#[async_trait::async_trait]
impl IdentityProvider for FakeProvider {
    fn begin(
        &self,
        identity_url: &str,
        _ask_for: &[Attribute],
        return_to: &Url,
    ) -> Result<Url, IdentityError> {
        let mut url =
            Url::parse(identity_url).map_err(|e| IdentityError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("return_to", return_to.as_str());
        Ok(url)
    }

    async fn complete(
        &self,
        params: &HashMap<String, String>,
        endpoint: &Url,
    ) -> Result<IdentityResponse, IdentityError> {
        if params.get("mode").map(String::as_str) == Some("cancel") {
            return Err(IdentityError::Cancelled);
        }
        if let Some(claimed) = params.get("op_endpoint") {
            if claimed != endpoint.as_str() {
                return Err(IdentityError::Rejected);
            }
        }
        Ok(IdentityResponse {
            email: params.get("email").cloned(),
            nickname: params.get("nickname").cloned(),
        })
    }
}

async fn spawn_app() -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();

    let state = microblog::api::create_app_state_with_identity(config, Arc::new(FakeProvider))
        .await
        .expect("Failed to create app state");
    (microblog::api::router(state.clone()), state)
}

/// Carries the session cookie between requests like a browser would.
struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    fn new(app: &Router) -> Self {
        Self {
            app: app.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> Response<Body> {
        let builder = match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            let cleared = pair.split_once('=').is_none_or(|(_, v)| v.is_empty())
                || set_cookie.to_str().unwrap().contains("Max-Age=0");
            self.cookie = if cleared { None } else { Some(pair.to_string()) };
        }

        response
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri), Body::empty()).await
    }

    async fn post_form(&mut self, uri: &str, pairs: &[(&str, &str)]) -> Response<Body> {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    async fn post_json(&mut self, uri: &str, value: &serde_json::Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json"),
            Body::from(serde_json::to_string(value).unwrap()),
        )
        .await
    }

    /// Runs the whole handshake with "remember me" ticked and returns the final redirect.
    async fn login(
        &mut self,
        email: &str,
        nickname: Option<&str>,
        next: Option<&str>,
    ) -> Response<Body> {
        self.login_with(email, nickname, next, true).await
    }

    async fn login_with(
        &mut self,
        email: &str,
        nickname: Option<&str>,
        next: Option<&str>,
        remember_me: bool,
    ) -> Response<Body> {
        let mut form = vec![("openid", "https://provider.example/")];
        if remember_me {
            form.push(("remember_me", "y"));
        }
        if let Some(next) = next {
            form.push(("next", next));
        }
        let response = self.post_form("/login", &form).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("email", email);
        if let Some(nickname) = nickname {
            query.append_pair("nickname", nickname);
        }
        self.get(&format!("/login/complete?{}", query.finish())).await
    }

    async fn flashes(&mut self) -> Vec<String> {
        let body = json_body(self.get("/flashes").await).await;
        serde_json::from_value(body["data"]["messages"].clone()).unwrap()
    }
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_protected_pages_redirect_to_login() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    for (path, expected) in [
        ("/index", "/login?next=%2Findex"),
        ("/", "/login?next=%2F"),
        ("/edit", "/login?next=%2Fedit"),
        ("/user/john", "/login?next=%2Fuser%2Fjohn"),
    ] {
        let response = browser.get(path).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), expected);
    }
}

#[tokio::test]
async fn test_login_page_lists_providers() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.get("/login?next=/edit").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["providers"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"]["providers"][0]["name"], "Yahoo");
    assert_eq!(body["data"]["next"], "/edit");

    let body = json_body(browser.get("/login?next=https://evil.example/").await).await;
    assert!(body["data"]["next"].is_null());
}

#[tokio::test]
async fn test_blank_openid_is_rejected() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.post_form("/login", &[("openid", "   ")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["fields"]["openid"][0], "This field is required.");
}

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser
        .post_form("/login", &[("openid", "https://provider.example/")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let target = Url::parse(location(&response)).unwrap();
    assert_eq!(target.host_str(), Some("provider.example"));
    let query: HashMap<String, String> = target.query_pairs().into_owned().collect();
    assert_eq!(query["return_to"], "http://localhost:5000/login/complete");
}

#[tokio::test]
async fn test_first_login_creates_account() {
    let (app, state) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.login("john@example.com", Some("john"), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/index");

    let response = browser.get("/index").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["user"]["nickname"], "john");
    assert_eq!(
        body["data"]["user"]["avatar"],
        "https://www.gravatar.com/avatar/d4c74594d841139328695756648b6bd6?d=mm&s=128"
    );
    assert!(body["data"]["user"]["last_seen"].is_string());
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 2);

    let stored = state
        .store()
        .get_user_by_email("john@example.com")
        .await
        .unwrap()
        .expect("user was not stored");
    assert_eq!(stored.nickname, "john");
}

#[tokio::test]
async fn test_login_returns_to_next() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser
        .login("john@example.com", Some("john"), Some("/edit"))
        .await;
    assert_eq!(location(&response), "/edit");

    let response = browser.get("/edit").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["nickname"], "john");
}

#[tokio::test]
async fn test_missing_email_is_invalid_login() {
    let (app, state) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.login("", Some("ghost"), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    assert_eq!(browser.flashes().await, vec![messages::INVALID_LOGIN]);
    assert!(!state.store().nickname_exists("ghost").await.unwrap());

    let response = browser.get("/index").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_cancelled_login_is_invalid_login() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser
        .post_form("/login", &[("openid", "https://provider.example/"), ("next", "/edit")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = browser.get("/login/complete?mode=cancel").await;
    assert_eq!(location(&response), "/login");
    assert_eq!(browser.flashes().await, vec![messages::INVALID_LOGIN]);

    // Messages are shown once.
    assert!(browser.flashes().await.is_empty());

    // The cancelled attempt is used up; a replayed callback cannot finish it.
    let response = browser
        .get("/login/complete?email=john%40example.com&nickname=john")
        .await;
    assert_eq!(location(&response), "/login");
    assert_eq!(browser.flashes().await, vec![messages::INVALID_LOGIN]);
}

#[tokio::test]
async fn test_callback_without_pending_login_is_rejected() {
    let (app, state) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser
        .get("/login/complete?email=victim%40example.com")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(browser.flashes().await, vec![messages::INVALID_LOGIN]);
    assert!(
        state
            .store()
            .get_user_by_email("victim@example.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_callback_from_other_endpoint_is_rejected() {
    let (app, state) = spawn_app().await;
    let mut browser = Browser::new(&app);

    browser
        .post_form("/login", &[("openid", "https://provider.example/")])
        .await;

    let response = browser
        .get("/login/complete?email=victim%40example.com&op_endpoint=http%3A%2F%2F127.0.0.1%3A9%2F")
        .await;
    assert_eq!(location(&response), "/login");
    assert!(
        state
            .store()
            .get_user_by_email("victim@example.com")
            .await
            .unwrap()
            .is_none()
    );
}

fn session_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login did not set a session cookie")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_remember_me_outlives_browser_session() {
    let (app, _) = spawn_app().await;

    let mut remembered = Browser::new(&app);
    let response = remembered
        .login_with("john@example.com", Some("john"), None, true)
        .await;
    let cookie = session_cookie(&response);
    assert!(
        cookie.contains("Max-Age=") || cookie.contains("Expires="),
        "{cookie}"
    );

    let mut forgetful = Browser::new(&app);
    let response = forgetful
        .login_with("susan@example.com", Some("susan"), None, false)
        .await;
    let cookie = session_cookie(&response);
    assert!(
        !cookie.contains("Max-Age=") && !cookie.contains("Expires="),
        "{cookie}"
    );

    assert_eq!(forgetful.get("/index").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_returning_user_reuses_account() {
    let (app, _) = spawn_app().await;

    let mut first = Browser::new(&app);
    first.login("john@example.com", Some("john"), None).await;
    let before = json_body(first.get("/index").await).await;

    let mut second = Browser::new(&app);
    second
        .login("john@example.com", Some("johnny"), None)
        .await;
    let after = json_body(second.get("/index").await).await;

    assert_eq!(before["data"]["user"]["id"], after["data"]["user"]["id"]);
    assert_eq!(after["data"]["user"]["nickname"], "john");
}

#[tokio::test]
async fn test_nickname_collisions_get_suffixes() {
    let (app, _) = spawn_app().await;

    let mut nicknames = Vec::new();
    for email in ["john@a.example", "john@b.example", "john@c.example"] {
        let mut browser = Browser::new(&app);
        browser.login(email, Some("john"), None).await;
        let body = json_body(browser.get("/index").await).await;
        nicknames.push(body["data"]["user"]["nickname"].as_str().unwrap().to_string());
    }

    assert_eq!(nicknames, vec!["john", "john2", "john3"]);
}

#[tokio::test]
async fn test_nickname_falls_back_to_email_local_part() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    browser.login("susan.smith@example.com", None, None).await;
    let body = json_body(browser.get("/index").await).await;
    assert_eq!(body["data"]["user"]["nickname"], "susan.smith");
}

#[tokio::test]
async fn test_edit_profile() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.login("john@example.com", Some("john"), None).await;

    let response = browser
        .post_json(
            "/edit",
            &serde_json::json!({ "nickname": "johnny", "about_me": "Hello there" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["nickname"], "johnny");
    assert_eq!(body["data"]["about_me"], "Hello there");

    assert_eq!(browser.flashes().await, vec![messages::PROFILE_SAVED]);

    let response = browser.get("/user/johnny").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["user"]["about_me"], "Hello there");
    assert_eq!(body["data"]["posts"][0]["author"], "johnny");
}

#[tokio::test]
async fn test_edit_keeps_own_nickname() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.login("john@example.com", Some("john"), None).await;

    let response = browser
        .post_json("/edit", &serde_json::json!({ "nickname": "john", "about_me": "" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["nickname"], "john");
    assert!(body["data"]["about_me"].is_null());
}

#[tokio::test]
async fn test_edit_rejects_taken_nickname() {
    let (app, _) = spawn_app().await;

    let mut susan = Browser::new(&app);
    susan.login("susan@example.com", Some("susan"), None).await;

    let mut john = Browser::new(&app);
    john.login("john@example.com", Some("john"), None).await;

    let response = john
        .post_json("/edit", &serde_json::json!({ "nickname": "susan" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["fields"]["nickname"][0], messages::NICKNAME_IN_USE);

    let body = json_body(john.get("/index").await).await;
    assert_eq!(body["data"]["user"]["nickname"], "john");
    assert!(john.flashes().await.is_empty());
}

#[tokio::test]
async fn test_edit_rejects_blank_nickname() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.login("john@example.com", Some("john"), None).await;

    let response = browser
        .post_json("/edit", &serde_json::json!({ "nickname": "  " }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["fields"]["nickname"][0], "This field is required.");
}

#[tokio::test]
async fn test_unknown_user_redirects_with_flash() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.login("john@example.com", Some("john"), None).await;

    let response = browser.get("/user/nobody").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/index");
    assert_eq!(browser.flashes().await, vec!["User nobody not found."]);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.login("john@example.com", Some("john"), None).await;
    assert_eq!(browser.get("/index").await.status(), StatusCode::OK);

    let response = browser.get("/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/index");

    let response = browser.get("/index").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Findex");
}

#[tokio::test]
async fn test_logged_in_user_skips_login_page() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.login("john@example.com", Some("john"), None).await;

    let response = browser.get("/login").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/index");
}

#[tokio::test]
async fn test_security_headers_and_disabled_metrics() {
    let (app, _) = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}
