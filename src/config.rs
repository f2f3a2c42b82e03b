use rand::RngCore;
use serde::Deserialize;

/// Lifetime of an OAuth state entry. Fixed; not configurable.
pub const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerCfg {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Extra origins (scheme://host[:port]) the OAuth callback may redirect to.
    /// The origin of `public_url` is always allowed.
    #[serde(default)]
    pub redirect_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbCfg {
    /// SQLite path, e.g. `adgate.db` or `:memory:`
    #[serde(default = "default_db_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheCfg {
    /// `redis://host:6379/0`. When absent the in-process cache is used,
    /// which is only correct for a single instance.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_state_namespace")]
    pub key_namespace: String,
}

#[derive(Clone, Deserialize)]
pub struct JwtCfg {
    /// HS256 signing secret
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_minutes: i64,
}

// Hand-written so the secret never reaches the startup log.
impl std::fmt::Debug for JwtCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCfg")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_minutes", &self.refresh_ttl_minutes)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordCfg {
    /// argon2 time cost (iterations)
    #[serde(default = "default_password_cost")]
    pub cost: u32,
}

#[derive(Clone, Deserialize)]
pub struct PlatformCfg {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_platform_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_platform_auth_url")]
    pub auth_url: String,
    /// Callback registered with the platform. Defaults to our own callback route.
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub material_auth: bool,
    #[serde(default = "default_platform_timeout")]
    pub timeout_secs: u64,
    /// Refresh this many seconds before the recorded expiry.
    #[serde(default = "default_refresh_skew")]
    pub refresh_skew_secs: i64,
}

impl std::fmt::Debug for PlatformCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCfg")
            .field("app_id", &self.app_id)
            .field("secret", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("auth_url", &self.auth_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("material_auth", &self.material_auth)
            .field("timeout_secs", &self.timeout_secs)
            .field("refresh_skew_secs", &self.refresh_skew_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefresherCfg {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_refresher_interval")]
    pub interval_secs: u64,
    /// Refresh credentials expiring within this window.
    #[serde(default = "default_refresher_window")]
    pub window_minutes: i64,
}

/// Optional first admin account, created at startup when no user with that
/// name exists yet.
#[derive(Clone, Default, Deserialize)]
pub struct AdminCfg {
    #[serde(default)]
    pub bootstrap_username: Option<String>,
    #[serde(default)]
    pub bootstrap_password: Option<String>,
}

impl std::fmt::Debug for AdminCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCfg")
            .field("bootstrap_username", &self.bootstrap_username)
            .field("bootstrap_password", &self.bootstrap_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub db: DbCfg,
    #[serde(default)]
    pub cache: CacheCfg,
    #[serde(default)]
    pub jwt: JwtCfg,
    #[serde(default)]
    pub password: PasswordCfg,
    #[serde(default)]
    pub platform: PlatformCfg,
    #[serde(default)]
    pub refresher: RefresherCfg,
    #[serde(default)]
    pub admin: AdminCfg,
}

fn default_bind_addr() -> String { "127.0.0.1:8080".to_string() }
fn default_public_url() -> String { "http://127.0.0.1:8080".to_string() }
fn default_db_url() -> String { "adgate.db".to_string() }
fn default_state_namespace() -> String { "oauth:state:".to_string() }
fn default_issuer() -> String { "adgate".to_string() }
fn default_access_ttl() -> i64 { 120 }
fn default_refresh_ttl() -> i64 { 7 * 24 * 60 }
fn default_password_cost() -> u32 { 3 }
fn default_platform_api_base() -> String { "https://ad.oceanengine.com/open_api".to_string() }
fn default_platform_auth_url() -> String { "https://ad.oceanengine.com/openapi/audit/oauth.html".to_string() }
fn default_platform_timeout() -> u64 { 30 }
fn default_refresh_skew() -> i64 { 300 }
fn default_true() -> bool { true }
fn default_refresher_interval() -> u64 { 600 }
fn default_refresher_window() -> i64 { 60 }

impl Default for ServerCfg {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), public_url: default_public_url(), redirect_origins: Vec::new() }
    }
}

impl Default for DbCfg {
    fn default() -> Self {
        Self { url: default_db_url() }
    }
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self { redis_url: None, key_namespace: default_state_namespace() }
    }
}

impl Default for JwtCfg {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: default_issuer(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_minutes: default_refresh_ttl(),
        }
    }
}

impl Default for PasswordCfg {
    fn default() -> Self {
        Self { cost: default_password_cost() }
    }
}

impl Default for PlatformCfg {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            secret: String::new(),
            api_base_url: default_platform_api_base(),
            auth_url: default_platform_auth_url(),
            redirect_uri: None,
            scopes: Vec::new(),
            material_auth: false,
            timeout_secs: default_platform_timeout(),
            refresh_skew_secs: default_refresh_skew(),
        }
    }
}

impl Default for RefresherCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_refresher_interval(),
            window_minutes: default_refresher_window(),
        }
    }
}

impl JwtCfg {
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.refresh_ttl_minutes)
    }
}

impl PlatformCfg {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_skew_secs)
    }
}

impl AppConfig {
    /// Loads `.env`, then `config/adgate.{toml,yaml,json}` if present, then
    /// `ADGATE__SECTION__KEY` environment variables (e.g. `ADGATE__JWT__SECRET`).
    /// `DATABASE_URL` and `REDIS_URL` are honoured as flat shortcuts.
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name("config/adgate").required(false))
            .add_source(
                ::config::Environment::with_prefix("ADGATE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("platform.scopes")
                    .with_list_parse_key("server.redirect_origins")
                    .try_parsing(true),
            )
            .set_override_option("db.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("cache.redis_url", std::env::var("REDIS_URL").ok())?
            .build()?;

        let mut cfg: AppConfig = settings.try_deserialize()?;
        cfg.ensure_signing_secret()?;
        Ok(cfg)
    }

    fn ensure_signing_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret.is_empty() {
            // Generate a dev secret and keep it in-memory only
            let mut key = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut key);
            self.jwt.secret = hex::encode(key);
            tracing::warn!(
                "ADGATE__JWT__SECRET not provided; generated a temporary dev secret. Sessions will be invalidated on restart."
            );
            return Ok(());
        }
        if self.jwt.secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "ADGATE__JWT__SECRET must be at least 32 bytes, got {}",
                self.jwt.secret.len()
            ));
        }
        Ok(())
    }

    /// Whether the post-authorization redirect may go to `target`.
    pub fn redirect_allowed(&self, target: &url::Url) -> bool {
        let origin = target.origin();
        origin.is_tuple()
            && std::iter::once(&self.server.public_url)
                .chain(&self.server.redirect_origins)
                .filter_map(|o| url::Url::parse(o).ok())
                .any(|o| o.origin() == origin)
    }

    /// Callback URL handed to the platform.
    pub fn platform_redirect_uri(&self) -> String {
        self.platform.redirect_uri.clone().unwrap_or_else(|| {
            format!("{}/api/v1/platform/oauth/callback", self.server.public_url.trim_end_matches('/'))
        })
    }
}
