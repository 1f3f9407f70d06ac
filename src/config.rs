use std::env;
use std::str::FromStr;

use chrono::Duration;

use crate::models::ClubIdentity;

/// AppConfig
///
/// The application's configuration, loaded once at startup and shared
/// read-only through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls cookie security and log format.
    pub env: Env,
    // Postgres connection string. `None` only in local runs, which then use
    // the in-memory stores.
    pub db_url: Option<String>,
    pub port: u16,
    // Directory the SPA entry point and assets are served from.
    pub public_dir: String,
    // Directory uploaded images are written to and served from as `/uploads`.
    pub upload_dir: String,
    // Absolute origin used to build links in outgoing emails.
    pub base_url: String,
    pub session_cookie: String,
    pub session_ttl_hours: i64,
    pub max_upload_bytes: usize,
    // Account seeded at startup when no admin exists.
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
    pub club_name: String,
    pub club_logo: String,
}

/// Env
///
/// Local development versus hardened production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests: local mode, memory stores, temp
    /// upload directory.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            port: 5000,
            public_dir: "public".to_string(),
            upload_dir: env::temp_dir()
                .join("fennec-uploads")
                .to_string_lossy()
                .into_owned(),
            base_url: "http://localhost:5000".to_string(),
            session_cookie: "fennec_sid".to_string(),
            session_ttl_hours: 24,
            max_upload_bytes: 1_000_000,
            admin_username: "admin".to_string(),
            admin_email: "admin@fennecfc.com".to_string(),
            admin_password: "admin123".to_string(),
            club_name: "Fennec FC".to_string(),
            club_logo: "/assets/images/brand-logo.png".to_string(),
        }
    }
}

fn parsed_or<T: FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

fn string_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment (after `.env` has been
    /// applied by the caller).
    ///
    /// # Panics
    /// In production, panics when `DATABASE_URL`, `ADMIN_PASSWORD` or
    /// `PUBLIC_BASE_URL` is missing, so the server never starts on insecure
    /// defaults.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();
        let port = parsed_or("PORT", defaults.port);

        let (db_url, admin_password, base_url) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("ADMIN_PASSWORD").expect("FATAL: ADMIN_PASSWORD required in prod"),
                env::var("PUBLIC_BASE_URL").expect("FATAL: PUBLIC_BASE_URL required in prod"),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                string_or("ADMIN_PASSWORD", &defaults.admin_password),
                env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}")),
            ),
        };

        Self {
            env,
            db_url,
            port,
            public_dir: string_or("PUBLIC_DIR", "public"),
            upload_dir: string_or("UPLOAD_DIR", "public/uploads"),
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie: string_or("SESSION_COOKIE", &defaults.session_cookie),
            session_ttl_hours: parsed_or("SESSION_TTL_HOURS", defaults.session_ttl_hours).max(1),
            max_upload_bytes: parsed_or("MAX_FILE_UPLOAD", defaults.max_upload_bytes),
            admin_username: string_or("ADMIN_USERNAME", &defaults.admin_username),
            admin_email: string_or("ADMIN_EMAIL", &defaults.admin_email).to_lowercase(),
            admin_password,
            club_name: string_or("CLUB_NAME", &defaults.club_name),
            club_logo: string_or("CLUB_LOGO", &defaults.club_logo),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }

    pub fn club(&self) -> ClubIdentity {
        ClubIdentity {
            name: self.club_name.clone(),
            logo: self.club_logo.clone(),
        }
    }
}
