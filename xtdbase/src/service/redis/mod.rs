//! Redis 서비스 모듈

pub mod core;
pub mod manager;

pub use self::core::{RetryOperation, RETRY_OPT};
pub use manager::{RedisConnectionStats, RedisManager};
