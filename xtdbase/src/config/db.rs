//! MySQL Database Configuration
//!
//! MySQL 연결 풀 설정입니다.
//! 구성 시점에 검증되며, 환경 변수(.env)에서 프로필 단위로 읽어올 수 있습니다.

use super::{env_parse, env_string};
use crate::tool::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use std::fmt;
use std::time::Duration;
use tracing::{error, warn};

/// MySQL 데이터베이스 설정 구조체
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,

    /// 풀의 최소 연결 수
    pub min_connections: u32,

    /// 풀의 최대 연결 수
    pub max_connections: u32,

    /// false 이면 단건 execute 가 트랜잭션으로 감싸져 명시적으로 커밋됩니다
    pub autocommit: bool,

    /// 연결 최대 수명. None 이면 회수하지 않음
    pub pool_recycle: Option<Duration>,

    /// 연결 획득 타임아웃
    pub connect_timeout: Duration,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "test".to_string(),
            charset: "utf8mb4".to_string(),
            min_connections: 1,
            max_connections: 10,
            autocommit: true,
            pool_recycle: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("autocommit", &self.autocommit)
            .field("pool_recycle", &self.pool_recycle)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl DbSettings {
    /// 환경 변수에서 프로필 설정을 읽어옵니다.
    ///
    /// `prefix` 는 `XTDB_DEFAULT` 같은 프로필 접두사입니다.
    /// 값이 없으면 경고를 남기고 기본값을 사용합니다.
    pub fn from_env_prefix(prefix: &str) -> Result<Self, AppError> {
        let defaults = Self::default();

        let recycle_secs: Option<i64> = env_parse(prefix, "POOL_RECYCLE_SECS")?;
        let connect_secs: u64 = env_parse(prefix, "CONNECT_TIMEOUT_SECS")?
            .unwrap_or(defaults.connect_timeout.as_secs());

        let settings = Self {
            host: env_string(prefix, "HOST").unwrap_or(defaults.host),
            port: env_parse(prefix, "PORT")?.unwrap_or(defaults.port),
            user: env_string(prefix, "USER").unwrap_or(defaults.user),
            password: env_string(prefix, "PASSWORD").unwrap_or(defaults.password),
            database: env_string(prefix, "DB").unwrap_or(defaults.database),
            charset: env_string(prefix, "CHARSET").unwrap_or(defaults.charset),
            min_connections: env_parse(prefix, "MIN_CONNECTIONS")?
                .unwrap_or(defaults.min_connections),
            max_connections: env_parse(prefix, "MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            autocommit: env_parse(prefix, "AUTOCOMMIT")?.unwrap_or(defaults.autocommit),
            // 음수는 "회수하지 않음"
            pool_recycle: recycle_secs
                .filter(|secs| *secs > 0)
                .map(|secs| Duration::from_secs(secs as u64)),
            connect_timeout: Duration::from_secs(connect_secs),
        };

        if env_string(prefix, "HOST").is_none() {
            warn!("{}_HOST 환경변수가 없어서 {}를 사용합니다.", prefix, settings.host);
        }
        if settings.password.is_empty() {
            error!("{}_PASSWORD 환경변수가 필요합니다.", prefix);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            (&self.host, "host"),
            (&self.user, "user"),
            (&self.database, "database"),
            (&self.charset, "charset"),
        ];
        for (value, name) in required {
            if value.trim().is_empty() {
                return Err(AppError::Configuration(format!(
                    "missing database connection parameter: {name}"
                )));
            }
        }

        if self.port == 0 {
            return Err(AppError::Configuration("port must not be 0".to_string()));
        }
        if self.max_connections == 0 {
            return Err(AppError::Configuration(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(AppError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(AppError::Configuration(
                "connect_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// sqlx 연결 옵션
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .charset(&self.charset)
    }

    /// sqlx 풀 옵션
    pub fn pool_options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .max_lifetime(self.pool_recycle)
    }

    /// 로그용 주소 (비밀번호 제외)
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(DbSettings::default().validate().is_ok());
    }

    #[test]
    fn test_pool_bounds_validation() {
        let settings = DbSettings {
            min_connections: 5,
            max_connections: 2,
            ..DbSettings::default()
        };
        assert!(matches!(settings.validate(), Err(AppError::Configuration(_))));

        let settings = DbSettings {
            max_connections: 0,
            min_connections: 0,
            ..DbSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_host_rejected() {
        let settings = DbSettings {
            host: "  ".to_string(),
            ..DbSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = DbSettings {
            password: "hunter2".to_string(),
            ..DbSettings::default()
        };
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_display_target() {
        assert_eq!(DbSettings::default().display_target(), "root@localhost:3306/test");
    }
}
