//! Named connection profiles
//!
//! `default`, `test`, `production` 같은 이름으로 연결 설정을 관리합니다.
//! 프로필 목록은 `XTDB_PROFILES` 에서, 각 프로필의 값은 `XTDB_<KEY>_*` 에서 읽습니다.

use super::{env_string, load_dotenv, load_dotenv_from, DbSettings, RedisSettings};
use crate::tool::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Profile {
    Mysql(DbSettings),
    Redis(RedisSettings),
}

impl Profile {
    pub fn kind(&self) -> &'static str {
        match self {
            Profile::Mysql(_) => "mysql",
            Profile::Redis(_) => "redis",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbProfiles {
    profiles: BTreeMap<String, Profile>,
}

impl DbProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// .env 를 로드한 뒤 환경 변수에서 모든 프로필을 읽어옵니다.
    pub fn from_env() -> Result<Self, AppError> {
        load_dotenv();
        Self::read_env()
    }

    /// 지정한 .env 파일을 로드한 뒤 프로필을 읽어옵니다.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        load_dotenv_from(path.as_ref())?;
        Self::read_env()
    }

    fn read_env() -> Result<Self, AppError> {
        let listed = env_string("XTDB", "PROFILES").unwrap_or_else(|| {
            warn!("XTDB_PROFILES 환경변수가 없어서 default 프로필만 사용합니다.");
            "default".to_string()
        });

        let mut profiles = Self::new();
        for key in listed.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let prefix = env_prefix(key)?;
            let kind = env_string(&prefix, "TYPE").unwrap_or_else(|| "mysql".to_string());

            let profile = match kind.to_ascii_lowercase().as_str() {
                "mysql" => Profile::Mysql(DbSettings::from_env_prefix(&prefix)?),
                "redis" => Profile::Redis(RedisSettings::from_env_prefix(&prefix)?),
                other => {
                    return Err(AppError::Configuration(format!(
                        "{prefix}_TYPE has unsupported value '{other}' (expected mysql|redis)"
                    )))
                }
            };
            profiles.insert(key, profile);
        }

        info!("설정 프로필 로드 완료: {:?}", profiles.keys());
        Ok(profiles)
    }

    pub fn insert(&mut self, key: impl Into<String>, profile: Profile) -> Option<Profile> {
        self.profiles.insert(key.into(), profile)
    }

    pub fn with_mysql(mut self, key: impl Into<String>, settings: DbSettings) -> Self {
        self.insert(key, Profile::Mysql(settings));
        self
    }

    pub fn with_redis(mut self, key: impl Into<String>, settings: RedisSettings) -> Self {
        self.insert(key, Profile::Redis(settings));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.profiles.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn get(&self, key: &str) -> Result<&Profile, AppError> {
        self.profiles.get(key).ok_or_else(|| {
            AppError::Configuration(format!(
                "profile '{}' does not exist; available: {}",
                key,
                self.keys().join(", ")
            ))
        })
    }

    pub fn mysql(&self, key: &str) -> Result<&DbSettings, AppError> {
        match self.get(key)? {
            Profile::Mysql(settings) => Ok(settings),
            other => Err(AppError::Configuration(format!(
                "profile '{key}' is a {} profile, not mysql",
                other.kind()
            ))),
        }
    }

    pub fn redis(&self, key: &str) -> Result<&RedisSettings, AppError> {
        match self.get(key)? {
            Profile::Redis(settings) => Ok(settings),
            other => Err(AppError::Configuration(format!(
                "profile '{key}' is a {} profile, not redis",
                other.kind()
            ))),
        }
    }
}

/// `test-db` -> `XTDB_TEST_DB`
pub fn env_prefix(key: &str) -> Result<String, AppError> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::Configuration(format!(
            "invalid profile key '{key}' (use letters, digits, '_' or '-')"
        )));
    }
    Ok(format!("XTDB_{}", key.to_ascii_uppercase().replace('-', "_")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("default").unwrap(), "XTDB_DEFAULT");
        assert_eq!(env_prefix("test-db").unwrap(), "XTDB_TEST_DB");
        assert!(env_prefix("bad key").is_err());
        assert!(env_prefix("").is_err());
    }

    #[test]
    fn test_lookup_by_kind() {
        let profiles = DbProfiles::new()
            .with_mysql("default", DbSettings::default())
            .with_redis("cache", RedisSettings::default());

        assert!(profiles.mysql("default").is_ok());
        assert!(profiles.redis("cache").is_ok());
        assert!(profiles.redis("default").is_err());
        assert_eq!(profiles.keys(), vec!["cache", "default"]);
    }

    #[test]
    fn test_missing_profile_lists_available() {
        let profiles = DbProfiles::new().with_mysql("default", DbSettings::default());
        let err = profiles.get("production").unwrap_err().to_string();
        assert!(err.contains("production"));
        assert!(err.contains("default"));
    }
}
