//! 쿼리 실행 보조 모듈
//!
//! 파라미터 바인딩, 결과 변환, 쿼리 로깅을 담당

use crate::service::db::core::config::QueryConfig;
use crate::service::db::core::types::{QueryRow, SqlValue};
use crate::tool::error::AppError;
use serde_json::{Number, Value};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row, TypeInfo};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// `?` 자리에 순서대로 파라미터 바인딩
pub fn bind_params<'q>(sql: &'q str, params: &[SqlValue]) -> Query<'q, MySql, MySqlArguments> {
    let mut query = sqlx::query(sql);

    for value in params {
        query = match value {
            Value::String(s) => query.bind(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else if let Some(f) = n.as_f64() {
                    query.bind(f)
                } else {
                    query.bind(n.to_string())
                }
            }
            Value::Bool(b) => query.bind(*b),
            Value::Null => query.bind(Option::<String>::None),
            // 배열 / 객체는 JSON 문자열로 저장
            _ => query.bind(value.to_string()),
        };
    }

    query
}

/// Convert database row to column-name map
///
/// 디코딩할 수 없는 값은 Null 로 바꾸지 않고 `DatabaseQuery` 에러로 반환합니다.
pub fn row_to_map(row: &MySqlRow) -> Result<QueryRow, AppError> {
    let mut result = HashMap::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name().to_ascii_uppercase();
        let value = decode_column(row, idx, &type_name).map_err(|e| {
            AppError::DatabaseQuery(format!(
                "failed to decode column '{}' ({}): {}",
                column.name(),
                type_name,
                e
            ))
        })?;
        result.insert(column.name().to_string(), value);
    }

    Ok(result)
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let base = type_name.split_whitespace().next().unwrap_or_default();

    let value = match base {
        "NULL" => Value::Null,
        "BOOLEAN" | "BOOL" => opt(row.try_get::<Option<bool>, _>(idx)?, Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR" => {
            if type_name.contains("UNSIGNED") {
                opt(row.try_get::<Option<u64>, _>(idx)?, Value::from)
            } else {
                opt(row.try_get::<Option<i64>, _>(idx)?, Value::from)
            }
        }
        "FLOAT" => opt(row.try_get::<Option<f32>, _>(idx)?, |v| float_value(f64::from(v))),
        "DOUBLE" => opt(row.try_get::<Option<f64>, _>(idx)?, float_value),
        // DECIMAL 은 텍스트로 전달됨
        "DECIMAL" | "NUMERIC" => opt(
            row.try_get_unchecked::<Option<String>, _>(idx)?,
            decimal_value,
        ),
        "DATE" => opt(row.try_get::<Option<chrono::NaiveDate>, _>(idx)?, |v| {
            Value::String(v.to_string())
        }),
        "DATETIME" | "TIMESTAMP" => opt(
            row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)?,
            |v| Value::String(v.to_string()),
        ),
        "TIME" => opt(row.try_get::<Option<chrono::NaiveTime>, _>(idx)?, |v| {
            Value::String(v.to_string())
        }),
        "JSON" => opt(row.try_get_unchecked::<Option<String>, _>(idx)?, |text| {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }),
        // 바이너리는 바이트 배열로
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => opt(row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)?, Value::from),
        _ => match row.try_get::<Option<String>, _>(idx) {
            Ok(text) => opt(text, Value::String),
            Err(sqlx::Error::ColumnDecode { .. }) => {
                opt(row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)?, bytes_value)
            }
            Err(e) => return Err(e),
        },
    };

    Ok(value)
}

fn opt<T>(decoded: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    decoded.map_or(Value::Null, f)
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

/// f64 로 정확히 되돌아오는 값만 숫자로, 나머지는 원래 문자열 그대로
fn decimal_value(text: String) -> Value {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v.to_string() == text => float_value(v),
        _ => Value::String(text),
    }
}

/// UTF-8 이면 문자열, 아니면 바이트 배열
fn bytes_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(e) => Value::from(e.into_bytes()),
    }
}

/// 쿼리 로깅 / 느린 쿼리 감지
#[derive(Debug, Clone, Default)]
pub struct QueryLogger {
    config: QueryConfig,
}

impl QueryLogger {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn log_query(&self, sql: &str, params: &[SqlValue]) {
        if self.config.enable_query_logging {
            if params.is_empty() {
                debug!("Executing query: {}", sql);
            } else {
                debug!("Executing query: {} | Params: {:?}", sql, params);
            }
        }
    }

    /// 임계값을 넘으면 경고 후 true
    pub fn check_slow_query(&self, sql: &str, elapsed: Duration) -> bool {
        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed_ms > self.config.slow_query_threshold_ms {
            warn!(
                "Slow query detected ({} ms): {}",
                elapsed_ms,
                sql.chars().take(200).collect::<String>()
            );
            return true;
        }
        false
    }
}
