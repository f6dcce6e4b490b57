//! Schema bootstrap for the sensor tables.
//!
//! Each table gets an `AFTER INSERT` trigger that publishes the new row id on a
//! notification channel named after the table. NOTIFY payloads are capped in
//! size, so the listener reads the row itself.

use crate::Table;

/// Shared notify function used by every table trigger
pub const NOTIFY_FUNCTION: &str = r#"
CREATE OR REPLACE FUNCTION surge_notify_insert() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify(TG_TABLE_NAME, NEW.id::text);
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#;

/// DDL for one readings table, its lookup index and its notify trigger
pub fn table_ddl(table: Table) -> String {
    let name = table.as_str();
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {name} (
    id          BIGSERIAL PRIMARY KEY,
    locality    TEXT NOT NULL,
    coords      JSONB NOT NULL,
    value       DOUBLE PRECISION NOT NULL,
    extra       JSONB,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS {name}_locality_created_at_idx ON {name} (locality, created_at);
DROP TRIGGER IF EXISTS {name}_notify_insert ON {name};
CREATE TRIGGER {name}_notify_insert
    AFTER INSERT ON {name}
    FOR EACH ROW EXECUTE FUNCTION surge_notify_insert();
"#
    )
}

/// Full migration script, idempotent
pub fn migration() -> String {
    let mut sql = String::from(NOTIFY_FUNCTION);
    for table in Table::ALL {
        sql.push_str(&table_ddl(table));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_covers_every_table() {
        let sql = migration();
        for table in Table::ALL {
            assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table.as_str())));
            assert!(sql.contains(&format!("{}_notify_insert", table.as_str())));
        }
        assert!(sql.contains("pg_notify(TG_TABLE_NAME, NEW.id::text)"));
        assert!(!sql.contains("row_to_json"));
    }
}
