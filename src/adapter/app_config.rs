use crate::adapter::database_config::{env_or, ConfigError};
use crate::domain::service::AutoCancelPolicy;
use chrono::{Duration, FixedOffset};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// 永続化の方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MySql,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(StorageBackend::MySql),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue(format!(
                "Invalid STORAGE_BACKEND: {}",
                other
            ))),
        }
    }
}

/// ログの出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue(format!("Invalid LOG_FORMAT: {}", other))),
        }
    }
}

/// アプリケーション設定
/// データベース以外の起動パラメータを環境変数から読み取る
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_addr: String,
    pub storage_backend: StorageBackend,
    /// 店舗の現地時刻のUTCからの差（分）
    pub store_utc_offset_minutes: i32,
    pub cancel_window_minutes: i64,
    /// 累計返金率がこの値以上になったら自動キャンセル（未設定なら無効）
    pub auto_cancel_refund_ratio: Option<Decimal>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// 環境変数から設定を読み取る
    /// 環境変数が設定されていない場合はデフォルト値を使用
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "mysql".to_string())
            .parse::<StorageBackend>()?;

        let store_utc_offset_minutes: i32 = env_or("STORE_UTC_OFFSET_MINUTES", 540)?;
        if store_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid STORE_UTC_OFFSET_MINUTES: {}",
                store_utc_offset_minutes
            )));
        }

        let cancel_window_minutes: i64 = env_or("CANCEL_WINDOW_MINUTES", 30)?;
        if cancel_window_minutes < 0 {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid CANCEL_WINDOW_MINUTES: {}",
                cancel_window_minutes
            )));
        }

        let auto_cancel_refund_ratio = match env::var("AUTO_CANCEL_REFUND_RATIO") {
            Ok(raw) if !raw.trim().is_empty() => {
                let ratio = Decimal::from_str(raw.trim()).map_err(|e| {
                    ConfigError::InvalidValue(format!("Invalid AUTO_CANCEL_REFUND_RATIO: {}", e))
                })?;
                // 範囲チェックはドメインの AutoCancelPolicy に任せる
                AutoCancelPolicy::new(ratio).map_err(|e| {
                    ConfigError::InvalidValue(format!("Invalid AUTO_CANCEL_REFUND_RATIO: {}", e))
                })?;
                Some(ratio)
            }
            _ => None,
        };

        let log_format = env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "plain".to_string())
            .parse::<LogFormat>()?;

        Ok(Self {
            server_addr,
            storage_backend,
            store_utc_offset_minutes,
            cancel_window_minutes,
            auto_cancel_refund_ratio,
            log_format,
        })
    }

    /// 店舗の現地時刻の時差
    pub fn store_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.store_utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "Invalid STORE_UTC_OFFSET_MINUTES: {}",
                self.store_utc_offset_minutes
            ))
        })
    }

    pub fn cancel_window(&self) -> Duration {
        Duration::minutes(self.cancel_window_minutes)
    }

    pub fn auto_cancel_policy(&self) -> Option<AutoCancelPolicy> {
        self.auto_cancel_refund_ratio
            .and_then(|ratio| AutoCancelPolicy::new(ratio).ok())
    }
}
