//! 동기 MySQL 연결 풀
//!
//! 비동기 드라이버의 모든 작업을 실행 브리지를 통해 백그라운드 호스트에서 실행하고
//! 결과를 기다립니다. 메서드 이름과 인자는 비동기 드라이버와 같고, 모든 호출에는
//! 기본 타임아웃(30초)이 적용됩니다.
//!
//! 드라이버 소켓은 호스트 런타임에 묶여 있으므로, 호스트가 재시작되면
//! (세대 번호가 바뀌면) 드라이버를 새로 만듭니다.

use crate::bridge::{BridgeError, ExecutionBridge};
use crate::config::BridgeConfig;
use crate::service::db::core::{
    AsyncDatabase, Connect, ExecOutcome, MySqlConnector, QueryRow, SqlValue, TxHandle,
};
use crate::service::db::pool::AsyncMySqlPool;
use crate::service::db::sql_builder::{make_insert_sql, make_update_sql, quote_identifier};
use crate::tool::error::AppError;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 드라이버와 그 드라이버를 만든 호스트 세대
type DriverSlot<D> = Option<(u64, Arc<D>)>;

pub struct SyncPool<C: Connect> {
    bridge: ExecutionBridge,
    connector: Arc<C>,
    driver: Mutex<DriverSlot<C::Driver>>,
}

/// sqlx MySQL 드라이버를 쓰는 동기 풀
pub type SyncMySqlPool = SyncPool<MySqlConnector>;

impl<C: Connect> SyncPool<C> {
    pub fn new(connector: C, config: BridgeConfig) -> Result<Self, AppError> {
        let bridge = ExecutionBridge::new(config)?;
        info!("동기 풀 생성: {}", connector.describe());
        Ok(Self {
            bridge,
            connector: Arc::new(connector),
            driver: Mutex::new(None),
        })
    }

    pub fn bridge(&self) -> &ExecutionBridge {
        &self.bridge
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn default_timeout(&self) -> Duration {
        self.bridge.default_timeout()
    }

    /// 현재 호스트 세대의 드라이버. 없거나 이전 세대 것이면 호스트 위에서 새로 연결
    ///
    /// 드라이버 슬롯 대기와 연결 모두 `deadline` 안에서 끝나야 합니다.
    fn driver(&self, deadline: Instant) -> Result<Arc<C::Driver>, AppError> {
        let lease = self.bridge.ensure_running()?;
        // 다른 호출이 연결 중이면 남은 시간만큼만 기다림
        let Some(mut slot) = self.driver.try_lock_until(deadline) else {
            return Err(deadline_exceeded());
        };

        if let Some((generation, driver)) = slot.as_ref() {
            if *generation == lease.generation {
                return Ok(driver.clone());
            }
            debug!(
                "host generation changed ({} -> {}), rebuilding driver",
                generation, lease.generation
            );
        }
        *slot = None;

        let connector = self.connector.clone();
        let driver = self
            .bridge
            .run_blocking(async move { connector.connect().await }, remaining(deadline)?)?;
        let driver = Arc::new(driver);
        *slot = Some((lease.generation, driver.clone()));
        Ok(driver)
    }

    /// 드라이버 준비부터 작업 완료까지 전체를 `timeout` 하나로 제한합니다.
    /// 타임아웃 에러의 `elapsed` 는 호출 전체에 걸린 시간입니다.
    fn call<T, F, Fut>(&self, timeout: Duration, op: F) -> Result<T, AppError>
    where
        F: FnOnce(Arc<C::Driver>) -> Fut,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
        T: Send + 'static,
    {
        if timeout.is_zero() {
            return Err(BridgeError::Configuration("timeout must be positive".to_string()).into());
        }
        let started = Instant::now();
        let deadline = started + timeout;

        let result = self.driver(deadline).and_then(|driver| {
            let left = remaining(deadline)?;
            self.bridge.run_blocking(op(driver), left)
        });

        result.map_err(|err| match err {
            AppError::Bridge(BridgeError::Timeout { cancelled, .. }) => {
                AppError::Bridge(BridgeError::Timeout {
                    elapsed: started.elapsed(),
                    cancelled,
                })
            }
            other => other,
        })
    }

    pub fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, AppError> {
        self.execute_with_timeout(query, params, self.default_timeout())
    }

    /// INSERT 는 last insert id, 그 외에는 영향받은 행 수
    pub fn execute_with_timeout(
        &self,
        query: &str,
        params: &[SqlValue],
        timeout: Duration,
    ) -> Result<u64, AppError> {
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(timeout, move |db| async move { db.execute(&query, &params).await })
    }

    pub fn execute_detailed(&self, query: &str, params: &[SqlValue]) -> Result<ExecOutcome, AppError> {
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(self.default_timeout(), move |db| async move {
            db.execute_detailed(&query, &params).await
        })
    }

    pub fn fetch_one(&self, query: &str, params: &[SqlValue]) -> Result<Option<QueryRow>, AppError> {
        self.fetch_one_with_timeout(query, params, self.default_timeout())
    }

    pub fn fetch_one_with_timeout(
        &self,
        query: &str,
        params: &[SqlValue],
        timeout: Duration,
    ) -> Result<Option<QueryRow>, AppError> {
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(timeout, move |db| async move { db.fetch_one(&query, &params).await })
    }

    pub fn fetch_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<QueryRow>, AppError> {
        self.fetch_all_with_timeout(query, params, self.default_timeout())
    }

    pub fn fetch_all_with_timeout(
        &self,
        query: &str,
        params: &[SqlValue],
        timeout: Duration,
    ) -> Result<Vec<QueryRow>, AppError> {
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(timeout, move |db| async move { db.fetch_all(&query, &params).await })
    }

    pub fn fetch_many(
        &self,
        query: &str,
        size: usize,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError> {
        if size == 0 {
            return Err(AppError::InvalidInput("fetch_many size must be positive".to_string()));
        }
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(self.default_timeout(), move |db| async move {
            db.fetch_many(&query, size, &params).await
        })
    }

    pub fn begin(&self) -> Result<TxHandle, AppError> {
        self.call(self.default_timeout(), |db| async move { db.begin().await })
    }

    pub fn commit(&self, tx: TxHandle) -> Result<(), AppError> {
        self.call(self.default_timeout(), move |db| async move { db.commit(tx).await })
    }

    pub fn rollback(&self, tx: TxHandle) -> Result<(), AppError> {
        self.call(self.default_timeout(), move |db| async move { db.rollback(tx).await })
    }

    pub fn execute_in(
        &self,
        tx: TxHandle,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ExecOutcome, AppError> {
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(self.default_timeout(), move |db| async move {
            db.execute_in(tx, &query, &params).await
        })
    }

    pub fn fetch_all_in(
        &self,
        tx: TxHandle,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError> {
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(self.default_timeout(), move |db| async move {
            db.fetch_all_in(tx, &query, &params).await
        })
    }

    /// 연결 확인. 어떤 실패든 false
    pub fn ping(&self) -> bool {
        match self.call(self.default_timeout(), |db| async move { db.ping().await }) {
            Ok(alive) => alive,
            Err(e) => {
                e.log("sync pool ping");
                false
            }
        }
    }

    /// 단건 INSERT. last insert id 반환
    pub fn insert<I, K>(&self, table: &str, data: I) -> Result<u64, AppError>
    where
        I: IntoIterator<Item = (K, SqlValue)>,
        K: AsRef<str>,
    {
        let stmt = make_insert_sql(data, table)?;
        self.execute(&stmt.sql, &stmt.params)
    }

    /// 여러 행을 하나의 트랜잭션으로 INSERT. 삽입된 총 행 수 반환
    pub fn insert_many<R, I, K>(&self, table: &str, rows: R) -> Result<u64, AppError>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, SqlValue)>,
        K: AsRef<str>,
    {
        let statements = rows
            .into_iter()
            .map(|row| make_insert_sql(row, table))
            .collect::<Result<Vec<_>, _>>()?;

        if statements.is_empty() {
            warn!("데이터 목록이 비어 있어서 삽입할 데이터가 없습니다.");
            return Ok(0);
        }

        self.call(self.default_timeout(), move |db| async move {
            let tx = db.begin().await?;
            let mut inserted = 0u64;
            for stmt in &statements {
                match db.execute_in(tx, &stmt.sql, &stmt.params).await {
                    Ok(outcome) => inserted += outcome.rows_affected,
                    Err(e) => {
                        if let Err(rollback_err) = db.rollback(tx).await {
                            warn!("rollback after failed insert_many also failed: {}", rollback_err);
                        }
                        return Err(e);
                    }
                }
            }
            db.commit(tx).await?;
            Ok(inserted)
        })
    }

    /// 조건에 맞는 행 UPDATE. 영향받은 행 수 반환
    pub fn update<I, K, W, WK>(&self, table: &str, data: I, where_clause: W) -> Result<u64, AppError>
    where
        I: IntoIterator<Item = (K, SqlValue)>,
        K: AsRef<str>,
        W: IntoIterator<Item = (WK, SqlValue)>,
        WK: AsRef<str>,
    {
        let stmt = make_update_sql(data, where_clause, table)?;
        self.execute(&stmt.sql, &stmt.params)
    }

    pub fn get_all(&self, table: &str) -> Result<Vec<QueryRow>, AppError> {
        let sql = format!("SELECT * FROM {}", quote_identifier(table, "table name")?);
        self.fetch_all(&sql, &[])
    }

    /// 현재 데이터베이스에 테이블이 있는지 확인
    pub fn has_table(&self, table: &str) -> Result<bool, AppError> {
        quote_identifier(table, "table name")?;
        let row = self.fetch_one(
            "SELECT COUNT(*) AS cnt FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
            &[Value::String(table.to_string())],
        )?;
        Ok(row
            .and_then(|r| r.get("cnt").and_then(Value::as_u64))
            .map_or(false, |count| count > 0))
    }

    pub fn server_version(&self) -> Result<Option<String>, AppError> {
        let row = self.fetch_one("SELECT VERSION() AS version", &[])?;
        Ok(row.and_then(|r| r.get("version").and_then(Value::as_str).map(str::to_string)))
    }

    /// 드라이버를 닫고 호스트를 멈춥니다. 다음 호출에서 호스트와 드라이버가 다시 만들어집니다.
    pub fn shutdown(&self) {
        self.release_driver();
        self.bridge.shutdown();
    }

    /// 드라이버를 닫고 브리지를 영구 종료합니다. 이후 호출은 `Closed` 에러
    pub fn close(&self) {
        self.release_driver();
        self.bridge.close();
        info!("동기 풀 종료: {}", self.connector.describe());
    }

    pub fn is_closed(&self) -> bool {
        self.bridge.coordinator().is_closed()
    }

    fn release_driver(&self) {
        let Some((generation, driver)) = self.driver.lock().take() else {
            return;
        };
        if !self.bridge.is_running() || self.bridge.generation() != generation {
            // 이전 호스트의 드라이버는 이미 런타임과 함께 정리됨
            return;
        }
        let closing = async move {
            driver.close().await;
            Ok::<(), AppError>(())
        };
        if let Err(e) = self.bridge.run_blocking(closing, self.default_timeout()) {
            e.log("sync pool driver close");
        }
    }
}

/// `elapsed` 는 `call` 에서 전체 경과 시간으로 채워짐
fn deadline_exceeded() -> AppError {
    BridgeError::Timeout {
        elapsed: Duration::ZERO,
        cancelled: false,
    }
    .into()
}

fn remaining(deadline: Instant) -> Result<Duration, AppError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(deadline_exceeded())
    } else {
        Ok(left)
    }
}

/// sqlx 풀 전용 기능
impl<C: Connect<Driver = AsyncMySqlPool>> SyncPool<C> {
    /// 현재 풀에 열린 연결 수
    pub fn pool_size(&self) -> Result<u32, AppError> {
        self.call(self.default_timeout(), |db: Arc<AsyncMySqlPool>| async move {
            Ok(db.pool_size().await)
        })
    }

    /// 결과를 `batch_size` 행씩 `on_batch` 에 넘깁니다. 콜백은 호스트 스레드에서 실행됩니다.
    pub fn iterate<F>(
        &self,
        query: &str,
        params: &[SqlValue],
        batch_size: usize,
        on_batch: F,
    ) -> Result<u64, AppError>
    where
        F: FnMut(Vec<QueryRow>) -> Result<(), AppError> + Send + 'static,
    {
        let (query, params) = (query.to_owned(), params.to_vec());
        self.call(self.default_timeout(), move |db: Arc<AsyncMySqlPool>| async move {
            db.iterate(&query, &params, batch_size, on_batch).await
        })
    }
}

impl<C: Connect> Drop for SyncPool<C> {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.release_driver();
        }
    }
}
