//! Synchronous pool over an in-memory driver
//!
//! The fake driver records every statement so the tests can check what the
//! sync surface sends, without a MySQL server.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use xtdbase::bridge::BridgeError;
use xtdbase::config::BridgeConfig;
use xtdbase::service::db::{
    AsyncDatabase, Connect, ExecOutcome, QueryRow, SqlValue, SyncPool, TxHandle,
};
use xtdbase::tool::error::AppError;

struct FakeState {
    connects: AtomicU32,
    closes: AtomicU32,
    healthy: AtomicBool,
    fail_connect: AtomicBool,
    connect_delay_ms: AtomicU64,
    connect_threads: Mutex<Vec<String>>,
    statements: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl FakeState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
            fail_connect: AtomicBool::new(false),
            connect_delay_ms: AtomicU64::new(0),
            connect_threads: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(100),
        })
    }

    fn record(&self, sql: impl Into<String>) {
        self.statements.lock().push(sql.into());
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

struct FakeConnector {
    state: Arc<FakeState>,
}

struct FakeDb {
    state: Arc<FakeState>,
    open_tx: Mutex<HashSet<u64>>,
    next_tx: AtomicU64,
}

#[async_trait]
impl Connect for FakeConnector {
    type Driver = FakeDb;

    async fn connect(&self) -> Result<FakeDb, AppError> {
        let name = std::thread::current().name().unwrap_or_default().to_string();
        self.state.connect_threads.lock().push(name);

        let delay = self.state.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection("connection refused".to_string()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeDb {
            state: self.state.clone(),
            open_tx: Mutex::new(HashSet::new()),
            next_tx: AtomicU64::new(1),
        })
    }
}

fn row(pairs: &[(&str, Value)]) -> QueryRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect::<HashMap<_, _>>()
}

impl FakeDb {
    fn check_tx(&self, tx: TxHandle) -> Result<(), AppError> {
        if self.open_tx.lock().contains(&tx.0) {
            Ok(())
        } else {
            Err(AppError::TransactionFailed(format!("unknown transaction {tx}")))
        }
    }

    fn outcome(&self, query: &str) -> Result<ExecOutcome, AppError> {
        if query.contains("broken") {
            return Err(AppError::DatabaseQuery("Unknown column 'broken'".to_string()));
        }
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }
}

#[async_trait]
impl AsyncDatabase for FakeDb {
    async fn fetch_one(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Option<QueryRow>, AppError> {
        self.state.record(query);
        if query.contains("SLEEP") {
            std::future::pending::<()>().await;
        }
        if query.contains("DELAY") {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        if query.contains("VERSION()") {
            return Ok(Some(row(&[("version", json!("8.0.36-fake"))])));
        }
        if query.contains("information_schema") {
            let count = if params.first() == Some(&json!("users")) { 1 } else { 0 };
            return Ok(Some(row(&[("cnt", json!(count))])));
        }
        if query.contains("missing") {
            return Ok(None);
        }
        Ok(Some(row(&[("id", params.first().cloned().unwrap_or(Value::Null))])))
    }

    async fn fetch_all(&self, query: &str, _params: &[SqlValue]) -> Result<Vec<QueryRow>, AppError> {
        self.state.record(query);
        Ok((1..=3).map(|i| row(&[("id", json!(i))])).collect())
    }

    async fn fetch_many(
        &self,
        query: &str,
        size: usize,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError> {
        if size == 0 {
            return Err(AppError::InvalidInput("size must be positive".to_string()));
        }
        let mut rows = self.fetch_all(query, params).await?;
        rows.truncate(size);
        Ok(rows)
    }

    async fn execute_detailed(
        &self,
        query: &str,
        _params: &[SqlValue],
    ) -> Result<ExecOutcome, AppError> {
        self.state.record(query);
        self.outcome(query)
    }

    async fn begin(&self) -> Result<TxHandle, AppError> {
        let tx = self.next_tx.fetch_add(1, Ordering::SeqCst);
        self.open_tx.lock().insert(tx);
        self.state.record("BEGIN");
        Ok(TxHandle(tx))
    }

    async fn commit(&self, tx: TxHandle) -> Result<(), AppError> {
        self.check_tx(tx)?;
        self.open_tx.lock().remove(&tx.0);
        self.state.record("COMMIT");
        Ok(())
    }

    async fn rollback(&self, tx: TxHandle) -> Result<(), AppError> {
        self.check_tx(tx)?;
        self.open_tx.lock().remove(&tx.0);
        self.state.record("ROLLBACK");
        Ok(())
    }

    async fn execute_in(
        &self,
        tx: TxHandle,
        query: &str,
        _params: &[SqlValue],
    ) -> Result<ExecOutcome, AppError> {
        self.check_tx(tx)?;
        self.state.record(query);
        self.outcome(query)
    }

    async fn fetch_all_in(
        &self,
        tx: TxHandle,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Vec<QueryRow>, AppError> {
        self.check_tx(tx)?;
        self.fetch_all(query, params).await
    }

    async fn ping(&self) -> Result<bool, AppError> {
        if self.state.healthy.load(Ordering::SeqCst) {
            Ok(true)
        } else {
            Err(AppError::DatabaseConnection("server has gone away".to_string()))
        }
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn pool(name: &str) -> (SyncPool<FakeConnector>, Arc<FakeState>) {
    let state = FakeState::new();
    let pool = SyncPool::new(
        FakeConnector {
            state: state.clone(),
        },
        BridgeConfig::default().with_thread_name(name),
    )
    .expect("pool");
    (pool, state)
}

#[cfg(test)]
mod delegation_tests {
    use super::*;

    #[test]
    fn test_execute_returns_insert_id_or_row_count() {
        let (pool, state) = pool("exec");

        let id = pool
            .execute("INSERT INTO users(name) VALUES (?)", &[json!("alice")])
            .unwrap();
        assert_eq!(id, 100);

        let affected = pool
            .execute("UPDATE users SET name = ? WHERE id = ?", &[json!("bob"), json!(100)])
            .unwrap();
        assert_eq!(affected, 1);

        assert_eq!(state.statements().len(), 2);
    }

    #[test]
    fn test_driver_created_once_on_host_thread() {
        let (pool, state) = pool("affinity");

        pool.fetch_one("SELECT ?", &[json!(1)]).unwrap();
        pool.fetch_all("SELECT id FROM t", &[]).unwrap();
        pool.execute("DELETE FROM t WHERE id = ?", &[json!(1)]).unwrap();

        assert_eq!(state.connects.load(Ordering::SeqCst), 1);
        assert_eq!(*state.connect_threads.lock(), vec!["affinity-1".to_string()]);
    }

    #[test]
    fn test_fetch_variants() {
        let (pool, _state) = pool("fetch");

        let row = pool.fetch_one("SELECT ?", &[json!(7)]).unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&json!(7)));
        assert!(pool.fetch_one("SELECT missing", &[]).unwrap().is_none());

        assert_eq!(pool.fetch_all("SELECT id FROM t", &[]).unwrap().len(), 3);
        assert_eq!(pool.fetch_many("SELECT id FROM t", 2, &[]).unwrap().len(), 2);
    }

    #[test]
    fn test_fetch_many_zero_size_rejected_without_connecting() {
        let (pool, state) = pool("fetch-many");
        let err = pool.fetch_many("SELECT 1", 0, &[]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(state.connects.load(Ordering::SeqCst), 0);
        assert!(!pool.bridge().is_running());
    }

    #[test]
    fn test_timeout_surfaces_as_bridge_error() {
        let (pool, _state) = pool("slow");
        let err = pool
            .fetch_one_with_timeout("SELECT SLEEP(10)", &[], Duration::from_millis(100))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(
            err,
            AppError::Bridge(BridgeError::Timeout { cancelled: true, .. })
        ));

        // 타임아웃 뒤에도 같은 드라이버로 계속 동작
        assert!(pool.fetch_one("SELECT ?", &[json!(1)]).unwrap().is_some());
    }

    #[test]
    fn test_ping_reports_false_on_failure() {
        let (pool, state) = pool("ping");
        assert!(pool.ping());

        state.healthy.store(false, Ordering::SeqCst);
        assert!(!pool.ping());
    }

    #[test]
    fn test_connect_failure_propagates() {
        let (pool, state) = pool("refused");
        state.fail_connect.store(true, Ordering::SeqCst);

        let err = pool.execute("DELETE FROM t", &[]).unwrap_err();
        assert!(matches!(err, AppError::DatabaseConnection(_)));
        assert!(!pool.ping());

        state.fail_connect.store(false, Ordering::SeqCst);
        assert!(pool.ping());
    }

    #[test]
    fn test_explicit_transaction() {
        let (pool, state) = pool("tx");

        let tx = pool.begin().unwrap();
        let outcome = pool
            .execute_in(tx, "INSERT INTO t(v) VALUES (?)", &[json!(1)])
            .unwrap();
        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(pool.fetch_all_in(tx, "SELECT v FROM t", &[]).unwrap().len(), 3);
        pool.commit(tx).unwrap();

        let err = pool.rollback(tx).unwrap_err();
        assert!(matches!(err, AppError::TransactionFailed(_)));
        assert!(state.statements().contains(&"COMMIT".to_string()));
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_driver_rebuilt_after_restart() {
        let (pool, state) = pool("restart");
        pool.fetch_one("SELECT ?", &[json!(1)]).unwrap();

        pool.shutdown();
        assert!(!pool.bridge().is_running());
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);

        pool.fetch_one("SELECT ?", &[json!(2)]).unwrap();
        assert_eq!(state.connects.load(Ordering::SeqCst), 2);
        assert_eq!(pool.bridge().generation(), 2);
        assert_eq!(
            *state.connect_threads.lock(),
            vec!["restart-1".to_string(), "restart-2".to_string()]
        );
    }

    #[test]
    fn test_close_is_final() {
        let (pool, state) = pool("close");
        pool.execute("DELETE FROM t", &[]).unwrap();

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);

        let err = pool.execute("DELETE FROM t", &[]).unwrap_err();
        assert!(matches!(err, AppError::Bridge(BridgeError::Closed)));
        assert!(!pool.ping());

        // 두 번째 close 는 아무 일도 하지 않음
        pool.close();
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes_driver() {
        let (pool, state) = pool("drop");
        pool.ping();
        drop(pool);
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
    }
}

#[cfg(test)]
mod crud_tests {
    use super::*;

    #[test]
    fn test_insert_builds_parameterized_sql() {
        let (pool, state) = pool("insert");
        let id = pool
            .insert("users", [("name", json!("alice")), ("age", json!(30))])
            .unwrap();
        assert_eq!(id, 100);
        assert_eq!(
            state.statements(),
            vec!["INSERT INTO `users` (`name`, `age`) VALUES (?, ?)".to_string()]
        );
    }

    #[test]
    fn test_insert_many_runs_in_one_transaction() {
        let (pool, state) = pool("insert-many");
        let rows = vec![
            vec![("name", json!("a"))],
            vec![("name", json!("b"))],
            vec![("name", json!("c"))],
        ];

        assert_eq!(pool.insert_many("users", rows).unwrap(), 3);
        let statements = state.statements();
        assert_eq!(statements.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(statements.last().map(String::as_str), Some("COMMIT"));
        assert_eq!(statements.len(), 5);
    }

    #[test]
    fn test_insert_many_rolls_back_on_failure() {
        let (pool, state) = pool("insert-many-fail");
        let rows = vec![vec![("name", json!("a"))], vec![("broken", json!("b"))]];

        let err = pool.insert_many("users", rows).unwrap_err();
        assert!(matches!(err, AppError::DatabaseQuery(_)));
        let statements = state.statements();
        assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!statements.contains(&"COMMIT".to_string()));
    }

    #[test]
    fn test_insert_many_empty_is_noop() {
        let (pool, state) = pool("insert-many-empty");
        let rows: Vec<Vec<(&str, Value)>> = Vec::new();
        assert_eq!(pool.insert_many("users", rows).unwrap(), 0);
        assert_eq!(state.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_update_with_operators() {
        let (pool, state) = pool("update");
        let affected = pool
            .update(
                "users",
                [("status", json!("inactive"))],
                [("last_login__lt", json!("2024-01-01")), ("deleted_at", Value::Null)],
            )
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(
            state.statements(),
            vec!["UPDATE `users` SET `status` = ? WHERE `last_login` < ? AND `deleted_at` IS NULL"
                .to_string()]
        );
    }

    #[test]
    fn test_update_without_where_rejected() {
        let (pool, state) = pool("update-all");
        let empty: [(&str, Value); 0] = [];
        let err = pool.update("users", [("a", json!(1))], empty).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(state.statements().is_empty());
    }

    #[test]
    fn test_has_table_and_version() {
        let (pool, _state) = pool("meta");
        assert!(pool.has_table("users").unwrap());
        assert!(!pool.has_table("orders").unwrap());
        assert!(pool.has_table("bad`name").is_err());
        assert_eq!(pool.server_version().unwrap().as_deref(), Some("8.0.36-fake"));
    }
}

#[cfg(test)]
mod deadline_tests {
    use super::*;

    fn slow_connect_pool(name: &str) -> (SyncPool<FakeConnector>, Arc<FakeState>) {
        let (pool, state) = pool(name);
        state.connect_delay_ms.store(300, Ordering::SeqCst);
        (pool, state)
    }

    #[test]
    fn test_connect_and_query_share_one_timeout() {
        let (pool, _state) = slow_connect_pool("deadline");
        let started = Instant::now();

        // 연결 300ms + 쿼리 300ms 는 400ms 안에 끝날 수 없음
        let err = pool
            .fetch_one_with_timeout("SELECT DELAY", &[], Duration::from_millis(400))
            .unwrap_err();
        let waited = started.elapsed();

        assert!(err.is_timeout());
        assert!(waited < Duration::from_millis(550), "blocked for {:?}", waited);
        match err {
            AppError::Bridge(BridgeError::Timeout { elapsed, .. }) => {
                assert!(elapsed >= Duration::from_millis(400), "reported {:?}", elapsed);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_waiting_for_another_callers_connect_is_bounded() {
        let (pool, state) = slow_connect_pool("deadline-wait");
        let pool = Arc::new(pool);

        let first = {
            let pool = pool.clone();
            thread::spawn(move || {
                pool.fetch_one_with_timeout("SELECT ?", &[json!(1)], Duration::from_secs(2))
            })
        };
        // 첫 번째 호출이 연결하는 중
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let err = pool
            .fetch_one_with_timeout("SELECT ?", &[json!(2)], Duration::from_millis(50))
            .unwrap_err();
        let waited = started.elapsed();

        assert!(err.is_timeout());
        assert!(waited < Duration::from_millis(200), "blocked for {:?}", waited);

        assert!(first.join().unwrap().unwrap().is_some());
        assert_eq!(state.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_timeout_is_configuration_error() {
        let (pool, state) = pool("deadline-zero");
        let err = pool
            .fetch_all_with_timeout("SELECT id FROM t", &[], Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, AppError::Bridge(BridgeError::Configuration(_))));
        assert_eq!(state.connects.load(Ordering::SeqCst), 0);
    }
}
