//! 설정 모듈
//!
//! 데이터베이스 / Redis 연결 프로필과 실행 브리지 설정을 관리합니다.

pub mod bridge;
pub mod db;
pub mod profiles;
pub mod redis_config;

pub use bridge::{timeout_from_secs, BridgeConfig, CancelPolicy};
pub use db::DbSettings;
pub use profiles::{DbProfiles, Profile};
pub use redis_config::RedisSettings;

use crate::tool::error::AppError;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// .env 파일 로드 - 현재 디렉토리, 없으면 상위 디렉토리에서 찾기
///
/// Returns the path that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = [
        Some(current_dir.join(".env")),
        current_dir.parent().map(|p| p.join(".env")),
    ];

    for path in candidates.into_iter().flatten() {
        if path.exists() && dotenv::from_path(&path).is_ok() {
            info!("환경 파일 로드: {:?}", path);
            return Some(path);
        }
    }

    warn!(".env 파일을 찾을 수 없어서 환경 변수를 직접 사용합니다.");
    None
}

pub fn load_dotenv_from(path: &Path) -> Result<(), AppError> {
    dotenv::from_path(path).map_err(|e| {
        AppError::Configuration(format!("failed to load env file {}: {e}", path.display()))
    })?;
    info!("환경 파일 로드: {:?}", path);
    Ok(())
}

/// `{prefix}_{name}` 환경변수 (빈 값은 없는 것으로 취급)
pub(crate) fn env_string(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{prefix}_{name}"))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses `{prefix}_{name}`; unset yields `Ok(None)`, garbage is an error.
pub(crate) fn env_parse<T: FromStr>(prefix: &str, name: &str) -> Result<Option<T>, AppError> {
    match env_string(prefix, name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            AppError::Configuration(format!("{prefix}_{name} has an invalid value: {raw}"))
        }),
    }
}
