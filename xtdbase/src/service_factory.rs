//! 연결 레지스트리와 팩토리 함수
//!
//! 프로세스 전역 싱글톤 대신 애플리케이션이 소유하는 레지스트리입니다.
//! 프로필 키마다 하나의 공유 핸들(`Arc<T>`)을 보관하고, 필요한 곳에 명시적으로 넘겨줍니다.

use crate::config::{BridgeConfig, DbProfiles};
use crate::service::db::{AsyncMySqlPool, MySqlConnector, SyncMySqlPool, SyncPool};
use crate::service::redis::RedisManager;
use crate::tool::error::AppError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ClientRegistry<T> {
    clients: DashMap<String, Arc<T>>,
}

impl<T> Default for ClientRegistry<T> {
    fn default() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }
}

impl<T> ClientRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 키에 해당하는 핸들을 반환하고, 없으면 `init` 으로 만들어 등록합니다.
    ///
    /// `init` 이 실행되는 동안 해당 키의 샤드가 잠기므로, `init` 안에서
    /// 같은 레지스트리를 다시 사용하면 안 됩니다. `init` 이 실패하면 아무것도 등록되지 않습니다.
    pub fn get_or_try_insert_with<F>(&self, key: &str, init: F) -> Result<Arc<T>, AppError>
    where
        F: FnOnce() -> Result<T, AppError>,
    {
        match self.clients.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let client = Arc::new(init()?);
                entry.insert(client.clone());
                debug!("registry: '{}' 등록", key);
                Ok(client)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.clients.get(key).map(|entry| entry.value().clone())
    }

    /// 등록 해제. 핸들을 들고 있는 다른 곳이 없으면 여기서 정리됩니다.
    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.clients.remove(key).map(|(_, client)| client)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// 프로필 키로 비동기 MySQL 풀 생성 (연결은 첫 사용 시)
pub fn create_mysql_pool(profiles: &DbProfiles, key: &str) -> Result<AsyncMySqlPool, AppError> {
    let settings = profiles.mysql(key)?.clone();
    info!("비동기 MySQL 풀 생성: {} ({})", key, settings.display_target());
    AsyncMySqlPool::new(settings)
}

/// 프로필 키로 동기 MySQL 풀 생성
pub fn create_sync_mysql_pool(
    profiles: &DbProfiles,
    key: &str,
    config: BridgeConfig,
) -> Result<SyncMySqlPool, AppError> {
    let settings = profiles.mysql(key)?.clone();
    let config = if config.thread_name == BridgeConfig::default().thread_name {
        config.with_thread_name(format!("xtdbase-{key}"))
    } else {
        config
    };
    SyncPool::new(MySqlConnector::new(settings), config)
}

/// 프로필 키로 Redis 클라이언트 생성
pub fn create_redis_client(profiles: &DbProfiles, key: &str) -> Result<RedisManager, AppError> {
    let settings = profiles.redis(key)?.clone();
    info!("Redis 클라이언트 생성: {} ({}:{})", key, settings.host, settings.port);
    RedisManager::new(settings)
}
