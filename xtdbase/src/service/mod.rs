pub mod db;
pub mod redis;

pub use db::{AsyncMySqlPool, SyncMySqlPool, SyncPool};
pub use redis::RedisManager;
