//! 비동기 MySQL 연결 풀
//!
//! sqlx `MySqlPool` 위에서 `AsyncDatabase` 를 구현합니다.
//! 풀은 첫 사용 시 생성되며 `close()` 이후에도 다시 초기화할 수 있습니다.

use crate::config::DbSettings;
use crate::service::db::core::{
    bind_params, row_to_map, AsyncDatabase, ConnectionStats, ExecOutcome, QueryConfig,
    QueryLogger, QueryRow, RetryConfig, SqlValue, TxHandle,
};
use crate::tool::error::AppError;
use async_trait::async_trait;
use futures::TryStreamExt;
use parking_lot::Mutex as SyncMutex;
use sqlx::mysql::MySqlPool;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct AsyncMySqlPool {
    settings: DbSettings,
    retry: RetryConfig,
    logger: QueryLogger,

    /// 지연 생성되는 풀
    pool: Mutex<Option<MySqlPool>>,

    /// 열린 트랜잭션. 사용하는 동안에는 맵에서 빠져 있음
    transactions: SyncMutex<HashMap<u64, Transaction<'static, MySql>>>,
    next_tx: AtomicU64,

    connection_errors: AtomicU64,
    total_queries: AtomicU64,
}

impl AsyncMySqlPool {
    /// 설정을 검증하고 풀 핸들을 만듭니다. 실제 연결은 첫 사용 시점에 생성됩니다.
    pub fn new(settings: DbSettings) -> Result<Self, AppError> {
        settings.validate()?;
        Ok(Self {
            settings,
            retry: RetryConfig::default(),
            logger: QueryLogger::default(),
            pool: Mutex::new(None),
            transactions: SyncMutex::new(HashMap::new()),
            next_tx: AtomicU64::new(1),
            connection_errors: AtomicU64::new(0),
            total_queries: AtomicU64::new(0),
        })
    }

    pub fn with_query_config(mut self, config: QueryConfig) -> Self {
        self.logger = QueryLogger::new(config);
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn settings(&self) -> &DbSettings {
        &self.settings
    }

    pub fn query_config(&self) -> &QueryConfig {
        self.logger.config()
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// 풀이 없으면 생성해서 반환
    pub async fn init_pool(&self) -> Result<MySqlPool, AppError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let max_attempts = self.retry.attempts();
        let mut attempts = 0;
        let pool = loop {
            attempts += 1;
            match self
                .settings
                .pool_options()
                .connect_with(self.settings.connect_options())
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    self.connection_errors.fetch_add(1, Ordering::Relaxed);
                    if attempts >= max_attempts {
                        error!(
                            "MySQL 연결 풀 생성 실패 ({}), {}회 시도: {}",
                            self.settings.display_target(),
                            attempts,
                            e
                        );
                        return Err(AppError::DatabaseConnection(format!(
                            "failed to create pool for {}: {}",
                            self.settings.display_target(),
                            e
                        )));
                    }
                    warn!("Pool creation attempt {} failed, retrying: {}", attempts, e);
                    tokio::time::sleep(self.retry.retry_delay * attempts).await;
                }
            }
        };

        info!(
            "MySQL 연결 풀 생성: {} (min={}, max={})",
            self.settings.display_target(),
            self.settings.min_connections,
            self.settings.max_connections
        );
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Get connection with retry logic
    async fn acquire(&self) -> Result<PoolConnection<MySql>, AppError> {
        let pool = self.init_pool().await?;
        let max_attempts = self.retry.attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match pool.acquire().await {
                Ok(conn) => {
                    debug!("Connection acquired (attempt {}/{})", attempts, max_attempts);
                    return Ok(conn);
                }
                Err(e) => {
                    self.connection_errors.fetch_add(1, Ordering::Relaxed);
                    if attempts >= max_attempts {
                        error!("Failed to acquire connection after {} attempts: {}", attempts, e);
                        return Err(AppError::DatabaseConnection(format!(
                            "Connection pool exhausted: {}",
                            e
                        )));
                    }
                    warn!("Connection attempt {} failed, retrying: {}", attempts, e);
                    tokio::time::sleep(self.retry.retry_delay * attempts).await;
                }
            }
        }
    }

    /// 현재 풀에 열린 연결 수. 풀이 없으면 0
    pub async fn pool_size(&self) -> u32 {
        self.pool.lock().await.as_ref().map_or(0, |pool| pool.size())
    }

    pub async fn stats(&self) -> ConnectionStats {
        let (size, idle) = match self.pool.lock().await.as_ref() {
            Some(pool) => (pool.size(), pool.num_idle() as u32),
            None => (0, 0),
        };
        ConnectionStats {
            size,
            idle,
            max_connections: self.settings.max_connections,
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            total_queries: self.total_queries.load(Ordering::Relaxed),
        }
    }

    pub fn open_transactions(&self) -> usize {
        self.transactions.lock().len()
    }

    /// 결과를 `batch_size` 행씩 나눠 `on_batch` 에 전달합니다.
    ///
    /// 전체 결과를 메모리에 올리지 않고 스트리밍하며, 전달한 총 행 수를 반환합니다.
    /// `batch_size` 가 0 이면 설정의 기본 배치 크기를 사용합니다.
    pub async fn iterate<F>(
        &self,
        query: &str,
        params: &[SqlValue],
        batch_size: usize,
        mut on_batch: F,
    ) -> Result<u64, AppError>
    where
        F: FnMut(Vec<QueryRow>) -> Result<(), AppError> + Send,
    {
        let batch_size = if batch_size == 0 {
            self.logger.config().default_batch_size.max(1)
        } else {
            batch_size
        };

        self.logger.log_query(query, params);
        let start = Instant::now();
        let mut conn = self.acquire().await?;
        let mut rows = bind_params(query, params).fetch(&mut *conn);

        let mut total = 0u64;
        let mut batch = Vec::with_capacity(batch_size);
        while let Some(row) = rows.try_next().await.map_err(query_error)? {
            batch.push(row_to_map(&row)?);
            if batch.len() >= batch_size {
                total += batch.len() as u64;
                on_batch(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))?;
            }
        }
        if !batch.is_empty() {
            total += batch.len() as u64;
            on_batch(batch)?;
        }

        self.record_query(query, start);
        Ok(total)
    }

    async fn run_execute(
        &self,
        conn: &mut sqlx::MySqlConnection,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ExecOutcome, AppError> {
        let result = bind_params(query, params)
            .execute(conn)
            .await
            .map_err(query_error)?;
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    fn record_query(&self, query: &str, start: Instant) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.logger.check_slow_query(query, start.elapsed());
    }

    fn take_transaction(&self, tx: TxHandle) -> Result<Transaction<'static, MySql>, AppError> {
        self.transactions
            .lock()
            .remove(&tx.0)
            .ok_or_else(|| AppError::TransactionFailed(format!("unknown or busy transaction {tx}")))
    }
}

fn query_error(e: sqlx::Error) -> AppError {
    warn!("Query execution failed: {}", e);
    AppError::from(e)
}

#[async_trait]
impl AsyncDatabase for AsyncMySqlPool {
    async fn fetch_one(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Option<QueryRow>, AppError> {
        self.logger.log_query(query, params);
        let start = Instant::now();
        let mut conn = self.acquire().await?;

        let row = bind_params(query, params)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_error)?;

        self.record_query(query, start);
        row.as_ref().map(row_to_map).transpose()
    }

    async fn fetch_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<QueryRow>, AppError> {
        self.logger.log_query(query, params);
        let start = Instant::now();
        let mut conn = self.acquire().await?;

        let rows = bind_params(query, params)
            .fetch_all(&mut *conn)
            .await
            .map_err(query_error)?;

        self.record_query(query, start);
        let results = rows.iter().map(row_to_map).collect::<Result<Vec<_>, _>>()?;
        debug!("Query returned {} rows in {:?}", results.len(), start.elapsed());
        Ok(results)
    }

    async fn fetch_many(
        &self,
        query: &str,
        size: usize,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError> {
        if size == 0 {
            return Err(AppError::InvalidInput("fetch_many size must be positive".to_string()));
        }

        self.logger.log_query(query, params);
        let start = Instant::now();
        let mut conn = self.acquire().await?;

        let mut results = Vec::with_capacity(size.min(1024));
        {
            let mut rows = bind_params(query, params).fetch(&mut *conn);
            while results.len() < size {
                match rows.try_next().await.map_err(query_error)? {
                    Some(row) => results.push(row_to_map(&row)?),
                    None => break,
                }
            }
        }

        self.record_query(query, start);
        Ok(results)
    }

    async fn execute_detailed(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ExecOutcome, AppError> {
        self.logger.log_query(query, params);
        let start = Instant::now();

        let outcome = if self.settings.autocommit {
            let mut conn = self.acquire().await?;
            self.run_execute(&mut *conn, query, params).await?
        } else {
            // autocommit 이 꺼져 있으면 단건 실행도 명시적으로 커밋
            let pool = self.init_pool().await?;
            let mut tx = pool.begin().await.map_err(|e| {
                error!("Failed to start transaction: {}", e);
                AppError::TransactionFailed(format!("Transaction start failed: {}", e))
            })?;
            match self.run_execute(&mut *tx, query, params).await {
                Ok(outcome) => {
                    tx.commit().await.map_err(|e| {
                        error!("Failed to commit transaction: {}", e);
                        AppError::TransactionFailed(format!("Transaction commit failed: {}", e))
                    })?;
                    outcome
                }
                Err(err) => {
                    if let Err(e) = tx.rollback().await {
                        error!("Failed to rollback transaction: {}", e);
                    }
                    return Err(err);
                }
            }
        };

        self.record_query(query, start);
        Ok(outcome)
    }

    async fn begin(&self) -> Result<TxHandle, AppError> {
        let pool = self.init_pool().await?;
        let tx = pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::TransactionFailed(format!("Transaction start failed: {}", e))
        })?;

        let handle = TxHandle(self.next_tx.fetch_add(1, Ordering::Relaxed));
        self.transactions.lock().insert(handle.0, tx);
        debug!("Transaction started: {}", handle);
        Ok(handle)
    }

    async fn commit(&self, tx: TxHandle) -> Result<(), AppError> {
        let transaction = self.take_transaction(tx)?;
        transaction.commit().await.map_err(|e| {
            error!("Failed to commit {}: {}", tx, e);
            AppError::TransactionFailed(format!("Transaction commit failed: {}", e))
        })?;
        debug!("Transaction committed: {}", tx);
        Ok(())
    }

    async fn rollback(&self, tx: TxHandle) -> Result<(), AppError> {
        let transaction = self.take_transaction(tx)?;
        transaction.rollback().await.map_err(|e| {
            error!("Failed to rollback {}: {}", tx, e);
            AppError::TransactionFailed(format!("Transaction rollback failed: {}", e))
        })?;
        warn!("Transaction rolled back: {}", tx);
        Ok(())
    }

    async fn execute_in(
        &self,
        tx: TxHandle,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ExecOutcome, AppError> {
        self.logger.log_query(query, params);
        let start = Instant::now();

        let mut transaction = self.take_transaction(tx)?;
        let result = self.run_execute(&mut *transaction, query, params).await;
        self.transactions.lock().insert(tx.0, transaction);

        self.record_query(query, start);
        result
    }

    async fn fetch_all_in(
        &self,
        tx: TxHandle,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError> {
        self.logger.log_query(query, params);
        let start = Instant::now();

        let mut transaction = self.take_transaction(tx)?;
        let rows = bind_params(query, params).fetch_all(&mut *transaction).await;
        self.transactions.lock().insert(tx.0, transaction);

        self.record_query(query, start);
        rows.map_err(query_error)?.iter().map(row_to_map).collect()
    }

    async fn ping(&self) -> Result<bool, AppError> {
        let pool = self.init_pool().await?;
        match sqlx::query("SELECT 1 AS health").fetch_one(&pool).await {
            Ok(_) => {
                debug!("Database health check passed");
                Ok(true)
            }
            Err(e) => {
                warn!("Database health check failed: {}", e);
                self.connection_errors.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
        }
    }

    async fn close(&self) {
        let abandoned: Vec<_> = self.transactions.lock().drain().map(|(_, tx)| tx).collect();
        if !abandoned.is_empty() {
            warn!(
                "Closing pool with {} open transaction(s); they will be rolled back",
                abandoned.len()
            );
        }
        drop(abandoned);

        if let Some(pool) = self.pool.lock().await.take() {
            pool.close().await;
            info!("MySQL 연결 풀 종료: {}", self.settings.display_target());
        }
    }
}
