use super::{env_parse, env_string};
use crate::tool::error::AppError;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl RedisSettings {
    pub fn from_env_prefix(prefix: &str) -> Result<Self, AppError> {
        let defaults = Self::default();
        let settings = Self {
            host: env_string(prefix, "HOST").unwrap_or(defaults.host),
            port: env_parse(prefix, "PORT")?.unwrap_or(defaults.port),
            db: env_parse(prefix, "REDIS_DB")?.unwrap_or(defaults.db),
            username: env_string(prefix, "USER"),
            password: env_string(prefix, "PASSWORD"),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.host.trim().is_empty() {
            return Err(AppError::Configuration("redis host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(AppError::Configuration("redis port must not be 0".to_string()));
        }
        if self.db < 0 {
            return Err(AppError::Configuration(format!(
                "redis db index must not be negative: {}",
                self.db
            )));
        }
        Ok(())
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                username: self.username.clone(),
                password: self.password.clone(),
            },
        }
    }
}
