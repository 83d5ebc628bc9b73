#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rusqlite::params;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use peptidex::auth::session;
use peptidex::config::Config;
use peptidex::content::{ContentIndex, Peptide, Section};
use peptidex::db;
use peptidex::state::AppState;

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const WEBHOOK_SECRET: &str = "whsec-test";

pub struct TestApp {
    _tmp: TempDir,
    pub state: AppState,
    pub router: Router,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub text: String,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text)
            .unwrap_or_else(|e| panic!("body is not JSON ({}): {}", e, self.text))
    }
}

fn sample_content() -> ContentIndex {
    let section = |heading: &str, body: &str| Section {
        heading: heading.into(),
        body: body.into(),
    };
    ContentIndex::new(vec![
        Peptide {
            slug: "bpc-157".into(),
            name: "BPC-157".into(),
            category: "Repair".into(),
            summary: "Studied in animal models of tissue repair.".into(),
            aliases: vec!["body-protection-compound-157".into()],
            sections: vec![section("Background", "Free background text.")],
            paid_sections: vec![section("Research review", "PAID-ONLY research notes.")],
        },
        Peptide {
            slug: "semaglutide".into(),
            name: "Semaglutide".into(),
            category: "Metabolic".into(),
            summary: "A GLP-1 receptor agonist.".into(),
            aliases: vec![],
            sections: vec![],
            paid_sections: vec![],
        },
    ])
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Like `new`, with a hook to adjust the config before the router is built.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let tmp = TempDir::new().unwrap();

        let mut config = Config::default();
        config.admin.token = Some(ADMIN_TOKEN.into());
        config.billing.webhook_secret = Some(WEBHOOK_SECRET.into());
        adjust(&mut config);
        config.resolve_paths(tmp.path());

        let pool = db::create_pool(&config.db_path()).unwrap();
        db::run_migrations(&pool).unwrap();

        let state = AppState::new(pool, config, sample_content());
        let router = peptidex::build_router(state.clone());

        Self {
            _tmp: tmp,
            state,
            router,
        }
    }

    /// Insert a profile and open a session for it. Returns (user_id, cookie header).
    pub fn seed_user(&self, email: &str) -> (String, String) {
        let conn = self.state.db.get().unwrap();
        let user_id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO profiles (id, email, password_hash) VALUES (?1, ?2, 'unused')",
            params![user_id, email],
        )
        .unwrap();
        let token = session::create_session(&conn, &user_id, 1).unwrap();
        let cookie = format!("{}={}", self.state.config.auth.cookie_name, token);
        (user_id, cookie)
    }

    pub fn seed_admin(&self, email: &str) -> (String, String) {
        let (id, cookie) = self.seed_user(email);
        let conn = self.state.db.get().unwrap();
        conn.execute("UPDATE profiles SET is_admin = 1 WHERE id = ?1", params![id])
            .unwrap();
        (id, cookie)
    }

    pub fn grant_role(&self, user_id: &str, role: &str) {
        let conn = self.state.db.get().unwrap();
        conn.execute(
            "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)",
            params![user_id, role],
        )
        .unwrap();
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        Response {
            status,
            headers,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let headers: Vec<(&str, &str)> = cookie.map(|c| ("cookie", c)).into_iter().collect();
        self.send(Method::GET, uri, &headers, None).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> Response {
        let headers: Vec<(&str, &str)> = cookie.map(|c| ("cookie", c)).into_iter().collect();
        self.send(Method::POST, uri, &headers, Some(body)).await
    }
}
