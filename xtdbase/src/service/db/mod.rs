//! 데이터베이스 서비스 모듈
//!
//! MySQL 비동기 풀, 실행 브리지 위의 동기 풀, SQL 생성 헬퍼를 제공합니다.

pub mod core;
pub mod pool;
pub mod sql_builder;
pub mod sync_pool;

pub use self::core::{
    AsyncDatabase, Connect, ConnectionStats, ExecOutcome, MySqlConnector, QueryConfig, QueryRow,
    RetryConfig, SqlValue, TxHandle,
};
pub use pool::AsyncMySqlPool;
pub use sql_builder::{make_insert_sql, make_update_sql, SqlStatement};
pub use sync_pool::{SyncMySqlPool, SyncPool};
