//! Redis 연결 관리
//!
//! 프로필 설정(`RedisSettings`)으로 클라이언트를 만들고, 비동기 작업은 공유
//! `ConnectionManager` 로, 동기 작업은 직접 연결로 처리합니다.
//! 키 / 자료구조 단위 헬퍼는 제공하지 않고 명령을 그대로 전달합니다.

use super::core::{RetryOperation, RETRY_OPT};
use crate::config::RedisSettings;
use crate::tool::error::AppError;
use redis::{aio::ConnectionManager, Client, Cmd, FromRedisValue};
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct RedisManager {
    settings: RedisSettings,
    client: Client,
    manager: Mutex<Option<ConnectionManager>>,
    retry: RetryOperation,
}

impl fmt::Debug for RedisManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RedisManager {
    /// 클라이언트만 생성합니다. 연결은 첫 사용 시점에 맺어집니다.
    pub fn new(settings: RedisSettings) -> Result<Self, AppError> {
        settings.validate()?;
        let client = Client::open(settings.connection_info())
            .map_err(|e| AppError::Redis(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            settings,
            client,
            manager: Mutex::new(None),
            retry: RETRY_OPT,
        })
    }

    pub fn with_retry(mut self, retry: RetryOperation) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 공유 연결 매니저. 처음 호출될 때 재시도하며 연결합니다.
    pub async fn connection(&self) -> Result<ConnectionManager, AppError> {
        let mut guard = self.manager.lock().await;
        if let Some(manager) = guard.as_ref() {
            return Ok(manager.clone());
        }

        let manager = self
            .retry
            .execute(|| ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|e| {
                AppError::Redis(format!("Failed to create connection manager: {}", e))
            })?;

        info!(
            "Redis 연결 초기화 완료: {}:{} (db {})",
            self.settings.host, self.settings.port, self.settings.db
        );
        *guard = Some(manager.clone());
        Ok(manager)
    }

    /// 연결 상태 확인
    pub async fn ping(&self) -> Result<bool, AppError> {
        let mut conn = self.connection().await?;
        let reply = redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        debug!("Redis ping: {}", reply);
        Ok(reply == "PONG")
    }

    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, AppError> {
        let mut conn = self.connection().await?;
        Ok(cmd.query_async::<_, T>(&mut conn).await?)
    }

    pub async fn connection_stats(&self) -> Result<RedisConnectionStats, AppError> {
        let info: String = self.query(redis::cmd("INFO").arg("clients")).await?;
        Ok(RedisConnectionStats::parse_from_info(&info))
    }

    /// 동기 연결로 PING
    pub fn ping_blocking(&self) -> Result<bool, AppError> {
        let mut conn = self.client.get_connection()?;
        let reply: String = redis::cmd("PING").query(&mut conn)?;
        Ok(reply == "PONG")
    }

    pub fn query_blocking<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, AppError> {
        let mut conn = self.client.get_connection()?;
        Ok(cmd.query::<T>(&mut conn)?)
    }

    /// 헬스체크. 실패는 false 로 보고
    pub async fn health_check(&self) -> bool {
        match self.ping().await {
            Ok(alive) => alive,
            Err(e) => {
                e.log("Redis 헬스체크");
                false
            }
        }
    }
}

/// Redis 연결 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedisConnectionStats {
    pub connected_clients: u32,
    pub blocked_clients: u32,
    pub maxclients: u32,
}

impl RedisConnectionStats {
    /// INFO clients 결과에서 통계 파싱
    pub fn parse_from_info(info: &str) -> Self {
        let mut stats = Self::default();

        for line in info.lines() {
            let Some((key, value)) = line.trim().split_once(':') else {
                continue;
            };
            let value = value.trim().parse().unwrap_or(0);
            match key {
                "connected_clients" => stats.connected_clients = value,
                "blocked_clients" => stats.blocked_clients = value,
                "maxclients" => stats.maxclients = value,
                _ => {}
            }
        }

        stats
    }
}
