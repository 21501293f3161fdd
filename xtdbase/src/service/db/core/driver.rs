//! 비동기 데이터베이스 드라이버 인터페이스
//!
//! 동기 풀(`SyncPool`)은 이 트레이트만 알고 있으며, 실제 구현은
//! sqlx 기반 `AsyncMySqlPool` 또는 테스트용 인메모리 드라이버입니다.

use crate::config::DbSettings;
use crate::service::db::core::config::{QueryConfig, RetryConfig};
use crate::service::db::core::types::{ExecOutcome, QueryRow, SqlValue, TxHandle};
use crate::service::db::pool::AsyncMySqlPool;
use crate::tool::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait AsyncDatabase: Send + Sync + 'static {
    /// 단일 행 조회. 결과가 없으면 None
    async fn fetch_one(&self, query: &str, params: &[SqlValue])
        -> Result<Option<QueryRow>, AppError>;

    async fn fetch_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<QueryRow>, AppError>;

    /// 최대 `size` 행까지 조회. size 0 은 InvalidInput
    async fn fetch_many(
        &self,
        query: &str,
        size: usize,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError>;

    async fn execute_detailed(&self, query: &str, params: &[SqlValue])
        -> Result<ExecOutcome, AppError>;

    /// INSERT 는 last insert id, 그 외에는 영향받은 행 수
    async fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, AppError> {
        let outcome = self.execute_detailed(query, params).await?;
        Ok(outcome.primary_count(query))
    }

    async fn begin(&self) -> Result<TxHandle, AppError>;

    async fn commit(&self, tx: TxHandle) -> Result<(), AppError>;

    async fn rollback(&self, tx: TxHandle) -> Result<(), AppError>;

    async fn execute_in(
        &self,
        tx: TxHandle,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ExecOutcome, AppError>;

    async fn fetch_all_in(
        &self,
        tx: TxHandle,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError>;

    async fn ping(&self) -> Result<bool, AppError>;

    async fn close(&self);
}

/// 드라이버 생성기. 실행 호스트 위에서 호출되어야 소켓이 호스트 런타임에 묶입니다.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Driver: AsyncDatabase;

    async fn connect(&self) -> Result<Self::Driver, AppError>;

    /// 로그용 이름
    fn describe(&self) -> String {
        std::any::type_name::<Self::Driver>().to_string()
    }
}

/// sqlx MySQL 드라이버 생성기
///
/// 연결 설정과 함께 쿼리 로깅 / 재시도 설정을 들고 있다가, 호스트 위에서
/// 설정이 적용된 `AsyncMySqlPool` 을 만듭니다.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    pub settings: DbSettings,
    pub query: QueryConfig,
    pub retry: RetryConfig,
}

impl MySqlConnector {
    pub fn new(settings: DbSettings) -> Self {
        Self {
            settings,
            query: QueryConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_query_config(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 설정이 적용된 풀 핸들 (아직 연결하지 않음)
    pub fn build(&self) -> Result<AsyncMySqlPool, AppError> {
        Ok(AsyncMySqlPool::new(self.settings.clone())?
            .with_query_config(self.query.clone())
            .with_retry_config(self.retry.clone()))
    }
}

impl From<DbSettings> for MySqlConnector {
    fn from(settings: DbSettings) -> Self {
        Self::new(settings)
    }
}

#[async_trait]
impl Connect for MySqlConnector {
    type Driver = AsyncMySqlPool;

    async fn connect(&self) -> Result<AsyncMySqlPool, AppError> {
        let pool = self.build()?;
        pool.init_pool().await?;
        Ok(pool)
    }

    fn describe(&self) -> String {
        self.settings.display_target()
    }
}
