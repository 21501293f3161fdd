//! xtdbase
//!
//! MySQL / Redis 연결 관리 라이브러리입니다. 비동기 sqlx 풀을 동기 코드에서
//! 그대로 쓸 수 있도록 백그라운드 실행 호스트 위에서 돌리는 실행 브리지를 제공합니다.
//!
//! - [`bridge`]: 동기 호출 → 백그라운드 호스트 → 결과 대기
//! - [`config`]: `.env` 기반 연결 프로필과 브리지 설정
//! - [`service::db`]: 비동기 / 동기 MySQL 풀, SQL 생성 헬퍼
//! - [`service::redis`]: Redis 클라이언트
//! - [`service_factory`]: 애플리케이션 소유 레지스트리와 팩토리 함수
//!
//! ```no_run
//! use serde_json::json;
//! use xtdbase::config::{BridgeConfig, DbProfiles};
//! use xtdbase::service_factory::{create_sync_mysql_pool, ClientRegistry};
//!
//! let profiles = DbProfiles::from_env()?;
//! let registry = ClientRegistry::new();
//! let db = registry.get_or_try_insert_with("default", || {
//!     create_sync_mysql_pool(&profiles, "default", BridgeConfig::default())
//! })?;
//!
//! let id = db.insert("users", [("name", json!("alice"))])?;
//! let user = db.fetch_one("SELECT * FROM users WHERE id = ?", &[json!(id)])?;
//! println!("{:?}", user);
//! db.close();
//! # Ok::<(), xtdbase::AppError>(())
//! ```

pub mod bridge;
pub mod config;
pub mod logging;
pub mod service;
pub mod service_factory;
pub mod tool;

pub use bridge::{BridgeError, ExecutionBridge, LifecycleCoordinator};
pub use config::{BridgeConfig, CancelPolicy, DbProfiles, DbSettings, Profile, RedisSettings};
pub use service::db::{
    make_insert_sql, make_update_sql, AsyncDatabase, AsyncMySqlPool, Connect, ExecOutcome,
    MySqlConnector, QueryConfig, QueryRow, RetryConfig, SqlStatement, SqlValue, SyncMySqlPool,
    SyncPool, TxHandle,
};
pub use service::redis::RedisManager;
pub use service_factory::{
    create_mysql_pool, create_redis_client, create_sync_mysql_pool, ClientRegistry,
};
pub use tool::error::{AppError, ErrorSeverity};
