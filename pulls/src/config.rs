use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str =
    "https://gigu-backend-webapp-hzbrd3guaghphmam.canadacentral-01.azurewebsites.net";
pub const DEFAULT_PULL_PATH: &str = "api/Pull";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://gigu_cache.db?mode=rwc";

#[derive(Clone, Debug)]
pub struct PullsConfig {
    // =========================
    // Remote authority
    // =========================
    /// Base URL of the marketplace backend, without trailing slash.
    pub api_base_url: String,

    /// Route of the pull resource, relative to `api_base_url`.
    ///
    /// All gateway endpoints hang off it:
    /// - `POST {path}` / `GET {path}`
    /// - `GET {path}/{id}` / `PUT {path}/{id}` / `PUT {path}/{id}/close`
    /// - `GET {path}/by-role?role=&userId=`
    pub pull_path: String,

    /// Upper bound for one HTTP exchange (connect + body).
    ///
    /// The backend gives no latency guarantee; without a bound a stalled
    /// request would leave the negotiation screen spinning forever.
    /// Expiry surfaces as a transport error.
    pub http_timeout: Duration,

    /// Remote calls slower than this are logged under the
    /// `performance` target.
    pub slow_call_threshold: Duration,

    // =========================
    // Local cache
    // =========================
    /// SQLite connection string for the offline cache.
    pub database_url: String,

    /// Maximum pooled cache connections.
    pub db_max_connections: u32,

    // =========================
    // Logging
    // =========================
    /// Deployment environment; `production` switches logs to JSON.
    pub app_env: String,
}

impl Default for PullsConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            pull_path: DEFAULT_PULL_PATH.to_string(),
            http_timeout: Duration::from_millis(10_000),
            slow_call_threshold: Duration::from_millis(1_500),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: 4,
            app_env: String::from("development"),
        }
    }
}

impl PullsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; missing keys keep
    /// their defaults, unparseable numbers are reported and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("GIGU_API_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let pull_path = lookup("GIGU_PULL_PATH")
            .map(|v| v.trim_matches('/').to_string())
            .unwrap_or(defaults.pull_path);

        Self {
            api_base_url,
            pull_path,
            http_timeout: millis_or(&lookup, "GIGU_HTTP_TIMEOUT_MS", defaults.http_timeout),
            slow_call_threshold: millis_or(
                &lookup,
                "GIGU_SLOW_CALL_MS",
                defaults.slow_call_threshold,
            ),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: parsed_or(
                &lookup,
                "GIGU_DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            ),
            app_env: lookup("APP_ENV").unwrap_or(defaults.app_env),
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// Absolute URL of the pull resource.
    pub fn pull_endpoint(&self) -> String {
        format!("{}/{}", self.api_base_url, self.pull_path)
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let ms = parsed_or(lookup, key, default.as_millis() as u64);
    Duration::from_millis(ms)
}

fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparseable config value");
                default
            }
        },
    }
}
