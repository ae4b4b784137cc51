use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// 設定エラー
/// 起動時に不正な環境変数を検出した場合に返す
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// 環境変数を読み取って型変換する（未設定・空文字なら既定値）
pub(crate) fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", key, e))),
        _ => Ok(default),
    }
}

/// MySQL接続設定
///
/// `DATABASE_URL` があればそれを使い、なければ個別の項目から組み立てる。
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
    /// プールから接続を取得するまでの待ち時間
    pub acquire_timeout: Duration,
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "local_market".to_string(),
            username: "local_market_user".to_string(),
            password: "local_market_password".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host: env_or("DATABASE_HOST", defaults.host)?,
            port: env_or("DATABASE_PORT", defaults.port)?,
            database: env_or("DATABASE_NAME", defaults.database)?,
            username: env_or("DATABASE_USER", defaults.username)?,
            password: env_or("DATABASE_PASSWORD", defaults.password)?,
            max_connections,
            acquire_timeout: Duration::from_secs(env_or(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
            url: env::var("DATABASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn connection_string(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            ),
        }
    }

    /// ログ出力用（パスワードを伏せる）
    pub fn redacted(&self) -> String {
        match &self.url {
            Some(url) => match (url.find("://"), url.rfind('@')) {
                (Some(scheme), Some(at)) if at > scheme => {
                    let credentials = &url[scheme + 3..at];
                    let user = credentials.split(':').next().unwrap_or_default();
                    format!("{}{}:***{}", &url[..scheme + 3], user, &url[at..])
                }
                _ => url.clone(),
            },
            None => format!(
                "mysql://{}:***@{}:{}/{}",
                self.username, self.host, self.port, self.database
            ),
        }
    }
}
