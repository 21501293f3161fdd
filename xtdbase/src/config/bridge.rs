//! Execution bridge settings

use crate::bridge::BridgeError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

/// What happens to an operation whose caller stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    /// Abort the task at its next suspension point and wait briefly for the
    /// acknowledgment.
    Abort,
    /// Leave the task running; it may still complete after the timeout.
    Detach,
}

impl std::str::FromStr for CancelPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(CancelPolicy::Abort),
            "detach" => Ok(CancelPolicy::Detach),
            other => Err(BridgeError::Configuration(format!(
                "unknown cancel policy '{other}' (expected abort|detach)"
            ))),
        }
    }
}

/// 브리지 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// 호스트 준비 신호를 기다리는 최대 시간
    pub startup_timeout: Duration,

    /// 동기 호출 기본 타임아웃
    pub default_timeout: Duration,

    pub cancel_policy: CancelPolicy,

    /// Abort 후 취소 확인을 기다리는 시간
    pub cancel_grace: Duration,

    /// 호스트 스레드 이름 접두사
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_millis(500),
            default_timeout: Duration::from_secs(30),
            cancel_policy: CancelPolicy::Abort,
            cancel_grace: Duration::from_millis(50),
            thread_name: "xtdbase-host".to_string(),
        }
    }
}

impl BridgeConfig {
    /// 환경변수에서 설정 로드
    ///
    /// `XTDB_BRIDGE_TIMEOUT_SECS` accepts fractional seconds; zero or negative
    /// values are rejected.
    pub fn from_env() -> Result<Self, BridgeError> {
        let mut config = Self::default();

        if let Ok(val) = env::var("XTDB_BRIDGE_TIMEOUT_SECS") {
            let secs: f64 = val.trim().parse().map_err(|_| {
                BridgeError::Configuration(format!("XTDB_BRIDGE_TIMEOUT_SECS is not a number: {val}"))
            })?;
            config.default_timeout = timeout_from_secs(secs)?;
        }

        if let Ok(val) = env::var("XTDB_BRIDGE_STARTUP_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) => config.startup_timeout = Duration::from_millis(ms),
                Err(_) => warn!("XTDB_BRIDGE_STARTUP_MS 값이 잘못되어 기본값을 사용합니다: {}", val),
            }
        }

        if let Ok(val) = env::var("XTDB_BRIDGE_CANCEL") {
            config.cancel_policy = val.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.startup_timeout.is_zero() {
            return Err(BridgeError::Configuration(
                "startup_timeout must be positive".to_string(),
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(BridgeError::Configuration(
                "default_timeout must be positive".to_string(),
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Converts caller-supplied seconds into a timeout, rejecting zero, negative
/// and non-finite values.
pub fn timeout_from_secs(secs: f64) -> Result<Duration, BridgeError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(BridgeError::Configuration(format!(
            "timeout must be a positive number of seconds, got {secs}"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}
