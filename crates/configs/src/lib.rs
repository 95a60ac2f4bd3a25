use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }

/// Token issuing configuration. The secret may also come from `JWT_SECRET`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { jwt_secret: String::new(), token_ttl_hours: default_token_ttl_hours() }
    }
}

fn default_token_ttl_hours() -> i64 { 12 }

/// Payment gateway credentials and endpoints.
///
/// Keys may be left empty in TOML and filled from `GATEWAY_PUBLIC_KEY`,
/// `GATEWAY_SECRET_KEY` and `GATEWAY_ENCRYPTED_KEY`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub encrypted_key: String,
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            public_key: String::new(),
            secret_key: String::new(),
            encrypted_key: String::new(),
            callback_url: default_callback_url(),
            currency: default_currency(),
            country: default_country(),
        }
    }
}

fn default_gateway_base_url() -> String { "https://seerbitapi.com/api/v2".to_string() }
fn default_callback_url() -> String { "http://localhost:5000".to_string() }
fn default_currency() -> String { "NGN".to_string() }
fn default_country() -> String { "NG".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_file_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { dir: default_upload_dir(), max_file_bytes: default_max_upload_bytes() }
    }
}

fn default_upload_dir() -> String { "data/uploads".to_string() }
fn default_max_upload_bytes() -> usize { 2_000_000 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        self.auth.normalize_from_env();
        self.gateway.normalize_from_env();
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        // TOML omitting the URL falls back to the environment
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn normalize_from_env(&mut self) {
        if self.jwt_secret.trim().is_empty() {
            if let Ok(secret) = std::env::var("JWT_SECRET") {
                self.jwt_secret = secret;
            }
        }
        if self.token_ttl_hours <= 0 {
            self.token_ttl_hours = default_token_ttl_hours();
        }
    }
}

impl GatewayConfig {
    pub fn normalize_from_env(&mut self) {
        if self.public_key.trim().is_empty() {
            if let Ok(v) = std::env::var("GATEWAY_PUBLIC_KEY") { self.public_key = v; }
        }
        if self.secret_key.trim().is_empty() {
            if let Ok(v) = std::env::var("GATEWAY_SECRET_KEY") { self.secret_key = v; }
        }
        if self.encrypted_key.trim().is_empty() {
            if let Ok(v) = std::env::var("GATEWAY_ENCRYPTED_KEY") { self.encrypted_key = v; }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.auth.token_ttl_hours, 12);
        assert_eq!(cfg.gateway.currency, "NGN");
        assert_eq!(cfg.uploads.max_file_bytes, 2_000_000);
    }

    #[test]
    fn parse_partial_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 5000

            [database]
            url = "postgres://u:p@localhost/school"

            [gateway]
            public_key = "pk"
            secret_key = "sk"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.database.url, "postgres://u:p@localhost/school");
        assert_eq!(cfg.gateway.public_key, "pk");
        assert!(cfg.gateway.base_url.starts_with("https://"));
    }

    #[test]
    fn database_url_scheme_enforced() {
        let db = DatabaseConfig { url: "mysql://nope".into(), ..Default::default() };
        assert!(db.validate().is_err());
    }

    #[test]
    fn server_port_zero_rejected() {
        let mut s = ServerConfig { host: "".into(), port: 0, worker_threads: None };
        assert!(s.normalize().is_err());
    }
}
