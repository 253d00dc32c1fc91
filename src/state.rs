use std::sync::Arc;
use mongodb::Client;
use crate::config::Config;
use crate::errors::AppResult;
use crate::middleware::{ensure_current, Claims};
use crate::models::{Role, User};
use crate::services::{GridFsService, MongoService, Notifier};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub mongo: MongoService,
    pub grid_fs: GridFsService,
    pub notifier: Notifier,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the driver client. The driver connects lazily, so this does not
    /// fail when the server is unreachable.
    pub async fn connect(config: Config) -> AppResult<Self> {
        let client = Client::with_uri_str(&config.mongo.url).await?;
        let db = client.database(&config.mongo.database);

        let mongo = MongoService::new(db.clone());
        let grid_fs = GridFsService::new(&db, &config.mongo.bucket, config.mongo.chunk_size_bytes);
        let notifier = Notifier::new(mongo.clone());

        Ok(Self {
            mongo,
            grid_fs,
            notifier,
            config: Arc::new(config),
        })
    }

    /// Reloads the caller's account for actions that change stored state.
    pub async fn current_user(&self, claims: &Claims) -> AppResult<User> {
        let user = self.mongo.get_user(&claims.user_id()?).await?;
        ensure_current(claims, user)
    }

    pub async fn confirm_admin(&self, claims: &Claims) -> AppResult<User> {
        claims.require_admin()?;
        self.current_user(claims).await
    }

    /// Creates the configured admin account when no admin exists yet.
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let Some(admin) = self.config.admin.as_ref() else {
            return Ok(());
        };
        if self.mongo.admin_exists().await? {
            tracing::debug!("Admin account already present");
            return Ok(());
        }

        let password_hash = bcrypt::hash(admin.password.as_bytes(), self.config.auth.bcrypt_cost)?;
        let user = User::new(admin.name.clone(), &admin.email, password_hash, Role::Admin, None, None);
        self.mongo.insert_user(&user).await?;

        tracing::warn!("Created bootstrap admin {}; change its password", user.email);
        Ok(())
    }
}
