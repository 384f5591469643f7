use invent_core::ServiceError;
use invent_sql::SQLStore;

/// Tables keep the full JSON document in `data`; the other columns are
/// copies used for lookup, ordering and uniqueness.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        name TEXT NOT NULL UNIQUE,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS product_serials (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        serial_number TEXT NOT NULL UNIQUE,
        product_id TEXT NOT NULL REFERENCES products(id),
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS installation_links (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        installation_code TEXT NOT NULL,
        serial_id TEXT NOT NULL UNIQUE REFERENCES product_serials(id),
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS customers (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        installation_code TEXT NOT NULL,
        port INTEGER NOT NULL CHECK (port > 0),
        customer_code TEXT,
        create_at TEXT,
        update_at TEXT,
        UNIQUE(installation_code, port)
    )",
    // Indexes
    "CREATE INDEX IF NOT EXISTS idx_serial_product ON product_serials(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_link_code ON installation_links(installation_code)",
    "CREATE INDEX IF NOT EXISTS idx_customer_code ON customers(customer_code)",
];

/// Create all tables and indexes if they don't exist.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(format!("schema init: {}", e)))?;
    }
    Ok(())
}
