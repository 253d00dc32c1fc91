use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub mongo: MongoConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub worker: WorkerConfig,
    pub admin: Option<AdminConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MongoConfig {
    pub url: String,
    pub database: String,
    pub bucket: String,
    pub chunk_size_bytes: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,  // in bytes
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub reminder_enabled: bool,
    pub reminder_interval_secs: u64,
}

/// Account created at startup when the users collection has no admin yet.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
