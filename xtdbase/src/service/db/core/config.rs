//! 데이터베이스 서비스 설정 모듈
//!
//! 쿼리 로깅과 연결 획득 재시도 설정

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 쿼리 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// 쿼리 로깅 활성화
    pub enable_query_logging: bool,

    /// 느린 쿼리 로깅 (임계값: ms)
    pub slow_query_threshold_ms: u64,

    /// iterate() 기본 배치 크기
    pub default_batch_size: usize,
}

/// 연결 획득 재시도 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 연결 재시도 활성화
    pub enable_retry: bool,

    /// 최대 시도 횟수
    pub max_retries: u32,

    /// 재시도 지연 시간 (시도 횟수만큼 곱해짐)
    pub retry_delay: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            enable_query_logging: true,
            slow_query_threshold_ms: 1000,
            default_batch_size: 1000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enable_retry: true,
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl RetryConfig {
    pub fn attempts(&self) -> u32 {
        if self.enable_retry {
            self.max_retries.max(1)
        } else {
            1
        }
    }
}
