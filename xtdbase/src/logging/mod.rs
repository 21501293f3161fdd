//! 로깅 초기화
//!
//! `tracing` 매크로로 남긴 로그를 `tracing-subscriber` fmt 출력으로 내보냅니다.
//! 라이브러리는 구독자를 직접 설치하지 않으며, 애플리케이션이 한 번 호출합니다.
//!
//! ```no_run
//! use xtdbase::logging::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::from_env())?;
//! tracing::info!("로깅 시작");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;

pub use config::LoggingConfig;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// 전역 구독자 설치
///
/// 이미 다른 구독자가 설치되어 있으면 `Ok(false)` 를 반환합니다.
pub fn init_logging(config: LoggingConfig) -> Result<bool> {
    config.validate()?;
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{}': {}", config.filter, e))?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.show_target)
        .with_thread_names(config.show_thread_names)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("로깅 초기화 완료: {}", config.filter);
    }
    Ok(installed)
}
