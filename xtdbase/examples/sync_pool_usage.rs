//! 동기 MySQL 풀 사용 예제
//!
//! `.env` 의 `default` 프로필로 연결해서 간단한 CRUD 를 실행합니다.
//!
//! 실행 방법:
//! ```bash
//! cargo run --example sync_pool_usage
//! ```

use serde_json::json;
use xtdbase::config::{BridgeConfig, DbProfiles};
use xtdbase::logging::{init_logging, LoggingConfig};
use xtdbase::service_factory::{create_sync_mysql_pool, ClientRegistry};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::from_env())?;

    println!("🗄️  동기 MySQL 풀 사용 예제");
    println!("================================");

    let profiles = DbProfiles::from_env()?;
    let bridge_config = BridgeConfig::from_env()?;

    let registry = ClientRegistry::new();
    let db = registry.get_or_try_insert_with("default", || {
        create_sync_mysql_pool(&profiles, "default", bridge_config.clone())
    })?;

    if !db.ping() {
        println!("❌ 데이터베이스에 연결할 수 없습니다.");
        return Ok(());
    }
    println!("✅ 연결 성공: {:?}", db.server_version()?);

    db.execute(
        "CREATE TABLE IF NOT EXISTS xtdb_demo (\
             id INT AUTO_INCREMENT PRIMARY KEY, \
             name VARCHAR(64) NOT NULL, \
             score DOUBLE NULL)",
        &[],
    )?;
    println!("테이블 존재 여부: {}", db.has_table("xtdb_demo")?);

    let id = db.insert("xtdb_demo", [("name", json!("alice")), ("score", json!(91.5))])?;
    println!("INSERT id = {}", id);

    let inserted = db.insert_many(
        "xtdb_demo",
        vec![
            vec![("name", json!("bob")), ("score", json!(78))],
            vec![("name", json!("carol")), ("score", json!(null))],
        ],
    )?;
    println!("insert_many: {} rows", inserted);

    let updated = db.update(
        "xtdb_demo",
        [("score", json!(80))],
        [("score__lt", json!(80))],
    )?;
    println!("UPDATE: {} rows", updated);

    for row in db.fetch_all("SELECT id, name, score FROM xtdb_demo ORDER BY id", &[])? {
        println!("  {:?}", row);
    }

    // 타임아웃 에러는 다른 에러와 구분 가능
    match db.fetch_one_with_timeout("SELECT SLEEP(2)", &[], std::time::Duration::from_millis(200)) {
        Err(e) if e.is_timeout() => println!("⏱️  타임아웃: {}", e),
        Err(e) => return Err(e.into()),
        Ok(_) => println!("SLEEP 완료"),
    }

    db.execute("DROP TABLE xtdb_demo", &[])?;
    db.close();
    registry.remove("default");

    println!("완료");
    Ok(())
}
