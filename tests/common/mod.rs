use axum::{body::Body, http::Request, Router};
use iqac_portal::{
    config::{AuthConfig, Config, MongoConfig, ServerConfig, UploadConfig, WorkerConfig},
    middleware::{issue_token, Claims},
    models::{Role, SubRole, User},
    router, AppState,
};

pub const SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origin: None,
        },
        mongo: MongoConfig {
            // Nothing listens here; the driver only connects on first use.
            url: "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200".into(),
            database: "iqac_test".into(),
            bucket: "documents".into(),
            chunk_size_bytes: None,
        },
        auth: AuthConfig {
            jwt_secret: SECRET.into(),
            token_ttl_hours: 1,
            bcrypt_cost: 4,
        },
        upload: UploadConfig {
            max_file_size: 1024 * 1024,
        },
        worker: WorkerConfig {
            reminder_enabled: false,
            reminder_interval_secs: 60,
        },
        admin: None,
    }
}

pub async fn app() -> Router {
    let state = AppState::connect(test_config())
        .await
        .expect("client should build without a server");
    router(state)
}

pub fn token(role: Role, subrole: Option<SubRole>) -> String {
    let user = User::new("Test".into(), "test@college.edu", "hash".into(), role, subrole, None);
    let claims = Claims::for_user(&user, 1).unwrap();
    issue_token(&claims, SECRET).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
