/// Schema for the device-scoped key/value tier.
pub const SCHEMA: &str = r#"
-- One row per storage key; values are serialized cache entries
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;
