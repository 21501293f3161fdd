//! 파라미터화된 INSERT / UPDATE 문 생성
//!
//! 식별자는 백틱으로 감싸고 값은 모두 `?` 로 바인딩합니다.
//! WHERE 키에는 `age__gt` 처럼 연산자 접미사를 붙일 수 있습니다.

use crate::service::db::core::SqlValue;
use crate::tool::error::{helpers::validate_identifier, AppError};
use serde_json::Value;

/// SQL 문과 바인딩 순서대로 정렬된 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhereOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    Like,
    In,
}

impl WhereOp {
    fn split(key: &str) -> (&str, WhereOp) {
        const SUFFIXES: [(&str, WhereOp); 7] = [
            ("__gte", WhereOp::Gte),
            ("__gt", WhereOp::Gt),
            ("__lte", WhereOp::Lte),
            ("__lt", WhereOp::Lt),
            ("__ne", WhereOp::Ne),
            ("__like", WhereOp::Like),
            ("__in", WhereOp::In),
        ];
        for (suffix, op) in SUFFIXES {
            if let Some(column) = key.strip_suffix(suffix) {
                if !column.is_empty() {
                    return (column, op);
                }
            }
        }
        (key, WhereOp::Eq)
    }

    fn symbol(self) -> &'static str {
        match self {
            WhereOp::Eq => "=",
            WhereOp::Gt => ">",
            WhereOp::Gte => ">=",
            WhereOp::Lt => "<",
            WhereOp::Lte => "<=",
            WhereOp::Ne => "!=",
            WhereOp::Like => "LIKE",
            WhereOp::In => "IN",
        }
    }
}

pub(crate) fn quote_identifier(name: &str, field_name: &str) -> Result<String, AppError> {
    validate_identifier(name, field_name)?;
    Ok(format!("`{}`", name))
}

/// 배열 / 객체는 JSON 문자열로 바인딩
fn bind_value(value: SqlValue) -> SqlValue {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other,
    }
}

/// INSERT 문 생성
///
/// ```
/// use serde_json::json;
/// use xtdbase::service::db::make_insert_sql;
///
/// let stmt = make_insert_sql([("name", json!("alice")), ("age", json!(30))], "users").unwrap();
/// assert_eq!(stmt.sql, "INSERT INTO `users` (`name`, `age`) VALUES (?, ?)");
/// assert_eq!(stmt.params, vec![json!("alice"), json!(30)]);
/// ```
pub fn make_insert_sql<I, K>(data: I, table: &str) -> Result<SqlStatement, AppError>
where
    I: IntoIterator<Item = (K, SqlValue)>,
    K: AsRef<str>,
{
    let table = quote_identifier(table, "table name")?;

    let mut columns = Vec::new();
    let mut params = Vec::new();
    for (key, value) in data {
        columns.push(quote_identifier(key.as_ref(), "column name")?);
        params.push(bind_value(value));
    }

    if columns.is_empty() {
        return Err(AppError::InvalidInput("INSERT data is empty".to_string()));
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(SqlStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        ),
        params,
    })
}

/// UPDATE 문 생성. WHERE 조건 없는 전체 갱신은 거부합니다.
pub fn make_update_sql<I, K, W, WK>(
    data: I,
    where_clause: W,
    table: &str,
) -> Result<SqlStatement, AppError>
where
    I: IntoIterator<Item = (K, SqlValue)>,
    K: AsRef<str>,
    W: IntoIterator<Item = (WK, SqlValue)>,
    WK: AsRef<str>,
{
    let table = quote_identifier(table, "table name")?;

    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for (key, value) in data {
        assignments.push(format!("{} = ?", quote_identifier(key.as_ref(), "column name")?));
        params.push(bind_value(value));
    }
    if assignments.is_empty() {
        return Err(AppError::InvalidInput("UPDATE data is empty".to_string()));
    }

    let conditions = build_where(where_clause, &mut params)?;
    if conditions.is_empty() {
        return Err(AppError::InvalidInput(
            "UPDATE without WHERE conditions is not allowed".to_string(),
        ));
    }

    Ok(SqlStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignments.join(", "),
            conditions.join(" AND ")
        ),
        params,
    })
}

fn build_where<W, WK>(where_clause: W, params: &mut Vec<SqlValue>) -> Result<Vec<String>, AppError>
where
    W: IntoIterator<Item = (WK, SqlValue)>,
    WK: AsRef<str>,
{
    let mut conditions = Vec::new();

    for (key, value) in where_clause {
        let (column, op) = WhereOp::split(key.as_ref());
        let column = quote_identifier(column, "column name")?;

        let condition = match (op, value) {
            (WhereOp::Eq, Value::Null) => format!("{} IS NULL", column),
            (WhereOp::Ne, Value::Null) => format!("{} IS NOT NULL", column),
            (WhereOp::In, Value::Array(items)) => {
                if items.is_empty() {
                    return Err(AppError::InvalidInput(format!(
                        "empty IN list for column {}",
                        column
                    )));
                }
                let placeholders = vec!["?"; items.len()].join(", ");
                params.extend(items.into_iter().map(bind_value));
                format!("{} IN ({})", column, placeholders)
            }
            (WhereOp::In, _) => {
                return Err(AppError::InvalidInput(format!(
                    "IN condition for column {} requires an array",
                    column
                )))
            }
            (_, Value::Null) => {
                return Err(AppError::InvalidInput(format!(
                    "NULL cannot be compared with {} on column {}",
                    op.symbol(),
                    column
                )))
            }
            (op, value) => {
                params.push(bind_value(value));
                format!("{} {} ?", column, op.symbol())
            }
        };
        conditions.push(condition);
    }

    Ok(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_suffix_split() {
        assert_eq!(WhereOp::split("age__gte"), ("age", WhereOp::Gte));
        assert_eq!(WhereOp::split("age__gt"), ("age", WhereOp::Gt));
        assert_eq!(WhereOp::split("name"), ("name", WhereOp::Eq));
        assert_eq!(WhereOp::split("__in"), ("__in", WhereOp::Eq));
    }

    #[test]
    fn test_nested_values_bound_as_json() {
        let stmt = make_insert_sql([("tags", json!(["a", "b"]))], "posts").unwrap();
        assert_eq!(stmt.params, vec![json!("[\"a\",\"b\"]")]);
    }

    #[test]
    fn test_null_comparison_rejected() {
        let err = make_update_sql([("a", json!(1))], [("b__gt", Value::Null)], "t").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
