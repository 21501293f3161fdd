use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use xtdbase::service::db::{make_insert_sql, make_update_sql};
use xtdbase::tool::error::AppError;

#[cfg(test)]
mod insert_tests {
    use super::*;

    #[test]
    fn test_insert_keeps_column_order() {
        let stmt = make_insert_sql(
            [("name", json!("alice")), ("email", json!("a@example.com")), ("age", json!(30))],
            "users",
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `users` (`name`, `email`, `age`) VALUES (?, ?, ?)");
        assert_eq!(stmt.params, vec![json!("alice"), json!("a@example.com"), json!(30)]);
    }

    #[test]
    fn test_insert_from_json_object() {
        let mut data = Map::new();
        data.insert("active".to_string(), json!(true));
        data.insert("meta".to_string(), json!({"k": 1}));

        let stmt = make_insert_sql(data, "flags").unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `flags` (`active`, `meta`) VALUES (?, ?)");
        assert_eq!(stmt.params, vec![json!(true), json!("{\"k\":1}")]);
    }

    #[test]
    fn test_insert_rejects_bad_input() {
        let empty: BTreeMap<String, Value> = BTreeMap::new();
        assert!(matches!(
            make_insert_sql(empty, "users"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(make_insert_sql([("a", json!(1))], "").is_err());
        assert!(make_insert_sql([("a`b", json!(1))], "users").is_err());
        assert!(make_insert_sql([("a", json!(1))], "users; DROP TABLE `x`").is_err());
    }
}

#[cfg(test)]
mod update_tests {
    use super::*;

    #[test]
    fn test_update_with_all_operators() {
        let stmt = make_update_sql(
            [("status", json!("vip"))],
            [
                ("age__gt", json!(18)),
                ("age__lte", json!(65)),
                ("score__gte", json!(10)),
                ("score__lt", json!(99)),
                ("name__like", json!("a%")),
                ("role__ne", json!("admin")),
                ("id__in", json!([1, 2, 3])),
            ],
            "users",
        )
        .unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE `users` SET `status` = ? WHERE `age` > ? AND `age` <= ? AND `score` >= ? \
             AND `score` < ? AND `name` LIKE ? AND `role` != ? AND `id` IN (?, ?, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![
                json!("vip"),
                json!(18),
                json!(65),
                json!(10),
                json!(99),
                json!("a%"),
                json!("admin"),
                json!(1),
                json!(2),
                json!(3),
            ]
        );
    }

    #[test]
    fn test_null_conditions() {
        let stmt = make_update_sql(
            [("note", Value::Null)],
            [("deleted_at", Value::Null), ("email__ne", Value::Null)],
            "users",
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE `users` SET `note` = ? WHERE `deleted_at` IS NULL AND `email` IS NOT NULL"
        );
        assert_eq!(stmt.params, vec![Value::Null]);
    }

    #[test]
    fn test_update_rejects_unsafe_shapes() {
        let no_where: Vec<(&str, Value)> = Vec::new();
        assert!(matches!(
            make_update_sql([("a", json!(1))], no_where, "t"),
            Err(AppError::InvalidInput(_))
        ));

        let no_data: Vec<(&str, Value)> = Vec::new();
        assert!(make_update_sql(no_data, [("id", json!(1))], "t").is_err());

        assert!(make_update_sql([("a", json!(1))], [("id__in", json!([]))], "t").is_err());
        assert!(make_update_sql([("a", json!(1))], [("id__in", json!(5))], "t").is_err());
    }
}
