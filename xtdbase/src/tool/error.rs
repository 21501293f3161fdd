//! Error Management System
//!
//! xtdbase 의 모든 에러를 체계적으로 관리합니다.
//! 드라이버(sqlx, redis) 에러를 AppError 로 변환하고, 심각도에 따른 로깅을 지원합니다.

use crate::bridge::BridgeError;
use thiserror::Error;
use tracing::{error, info, warn};

/// 공통 애플리케이션 에러 정의
///
/// 브리지, 데이터베이스, Redis, 설정 단계에서 발생할 수 있는 에러를 정의합니다.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    // 브리지 에러 (타임아웃, 호스트 기동 실패 등)
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    // 데이터베이스 관련 에러
    #[error("데이터베이스 연결 실패: {0}")]
    DatabaseConnection(String),

    #[error("데이터베이스 쿼리 실패: {0}")]
    DatabaseQuery(String),

    #[error("트랜잭션 실패: {0}")]
    TransactionFailed(String),

    #[error("중복된 데이터: {0}")]
    DuplicateEntry(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    // 입력값 검증 에러
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // 외부 서비스 에러
    #[error("Redis 에러: {0}")]
    Redis(String),

    // 시스템 에러
    #[error("타임아웃: {0}")]
    Timeout(String),

    #[error("내부 에러: {0}")]
    InternalError(String),
}

impl AppError {
    /// 에러의 심각도를 반환합니다.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Critical: 시스템 장애
            AppError::DatabaseConnection(_)
            | AppError::Bridge(BridgeError::HostCrashed(_))
            | AppError::Bridge(BridgeError::Startup(_)) => ErrorSeverity::Critical,

            // High: 작업 실패
            AppError::DatabaseQuery(_)
            | AppError::TransactionFailed(_)
            | AppError::Redis(_)
            | AppError::Bridge(_) => ErrorSeverity::High,

            // Medium: 사용자 입력 / 설정 오류
            AppError::InvalidInput(_) | AppError::Configuration(_) | AppError::Timeout(_) => {
                ErrorSeverity::Medium
            }

            // Low: 일반적인 경고
            AppError::DuplicateEntry(_) | AppError::NotFound(_) => ErrorSeverity::Low,

            AppError::InternalError(_) => ErrorSeverity::High,
        }
    }

    /// 에러를 로깅합니다.
    ///
    /// 심각도에 따라 적절한 로깅 레벨을 사용합니다.
    pub fn log(&self, context: &str) {
        let error_msg = self.to_string();

        match self.severity() {
            ErrorSeverity::Critical => error!("[CRITICAL] {} - {}", context, error_msg),
            ErrorSeverity::High => error!("[HIGH] {} - {}", context, error_msg),
            ErrorSeverity::Medium => warn!("[MEDIUM] {} - {}", context, error_msg),
            ErrorSeverity::Low => info!("[LOW] {} - {}", context, error_msg),
        }
    }

    /// True when the bridge gave up waiting on the operation.
    pub fn is_timeout(&self) -> bool {
        match self {
            AppError::Bridge(err) => err.is_timeout(),
            AppError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// 에러 심각도 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical, // 시스템 장애
    High,     // 작업 실패
    Medium,   // 사용자 입력 오류
    Low,      // 일반적인 경고
}

// SqlxError conversion
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Database record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // MySQL duplicate entry: SQLSTATE 23000 / error 1062
                match db_err.code() {
                    Some(code) if code == "23000" || code.starts_with("1062") => {
                        AppError::DuplicateEntry(db_err.to_string())
                    }
                    _ => AppError::DatabaseQuery(db_err.to_string()),
                }
            }
            sqlx::Error::Io(io_err) => AppError::DatabaseConnection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => AppError::DatabaseConnection(tls_err.to_string()),
            sqlx::Error::Protocol(msg) => AppError::DatabaseConnection(msg),
            sqlx::Error::PoolTimedOut => {
                AppError::Timeout("Database connection pool timeout".to_string())
            }
            sqlx::Error::PoolClosed => {
                AppError::DatabaseConnection("Database pool is closed".to_string())
            }
            sqlx::Error::Configuration(e) => AppError::Configuration(e.to_string()),
            _ => AppError::DatabaseQuery(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            AppError::Timeout(format!("Redis: {err}"))
        } else if err.is_connection_refusal() || err.is_connection_dropped() {
            AppError::Redis(format!("connection: {err}"))
        } else {
            AppError::Redis(err.to_string())
        }
    }
}

/// 에러 처리 헬퍼 함수들
pub mod helpers {
    use super::*;

    /// 식별자(테이블명, 컬럼명) 검증 헬퍼 함수
    pub fn validate_identifier(value: &str, field_name: &str) -> Result<(), AppError> {
        if value.trim().is_empty() {
            return Err(AppError::InvalidInput(format!("{field_name} is empty")));
        }

        if value.len() > 64 {
            return Err(AppError::InvalidInput(format!(
                "{field_name} too long (max: 64): {value}"
            )));
        }

        if value.contains('`') || value.contains('\0') {
            return Err(AppError::InvalidInput(format!(
                "{field_name} contains forbidden characters: {value}"
            )));
        }

        Ok(())
    }
}
