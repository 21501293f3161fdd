//! 로깅 설정 관리

use serde::{Deserialize, Serialize};

/// 로깅 시스템 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter 지시문 (기본값: "info")
    pub filter: String,

    /// ANSI 색상 출력 (기본값: true)
    pub ansi: bool,

    /// 로그에 타깃(모듈 경로) 표시 (기본값: true)
    pub show_target: bool,

    /// 로그에 스레드 이름 표시 (기본값: true, 호스트 스레드 구분용)
    pub show_thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
            show_target: true,
            show_thread_names: true,
        }
    }
}

impl LoggingConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("XTDB_LOG") {
            if !val.trim().is_empty() {
                config.filter = val.trim().to_string();
            }
        }

        if let Ok(val) = std::env::var("XTDB_LOG_ANSI") {
            config.ansi = parse_flag(&val, config.ansi);
        }

        if let Ok(val) = std::env::var("XTDB_LOG_TARGET") {
            config.show_target = parse_flag(&val, config.show_target);
        }

        config
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.filter.trim().is_empty() {
            return Err(anyhow::anyhow!("log filter must not be empty"));
        }
        Ok(())
    }
}

fn parse_flag(val: &str, fallback: bool) -> bool {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => fallback,
    }
}
