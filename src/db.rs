use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "lessonbuilder.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS modules(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_modules_sort ON modules(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pages(
            id TEXT PRIMARY KEY,
            module_id TEXT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(module_id) REFERENCES modules(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pages_module ON pages(module_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS blocks(
            id TEXT PRIMARY KEY,
            page_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            block_type TEXT NOT NULL,
            style_json TEXT NOT NULL,
            layout_json TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            content_json TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(page_id) REFERENCES pages(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_blocks_page ON blocks(page_id, order_index)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS form_schemas(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            schema_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS form_assignments(
            id TEXT PRIMARY KEY,
            form_schema_id TEXT NOT NULL,
            page_id TEXT NOT NULL,
            block_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(form_schema_id) REFERENCES form_schemas(id),
            FOREIGN KEY(page_id) REFERENCES pages(id),
            UNIQUE(form_schema_id, page_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_form_assignments_page ON form_assignments(page_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS media_assets(
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            storage_key TEXT NOT NULL,
            byte_size INTEGER,
            checksum_sha256 TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Append-only: rows are never updated or deleted.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_events(
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            actor TEXT,
            page_id TEXT,
            block_id TEXT,
            payload_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_learning_events_page ON learning_events(page_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    ensure_media_assets_byte_size(&conn)?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn ensure_media_assets_byte_size(conn: &Connection) -> anyhow::Result<()> {
    // Early workspaces recorded assets without a size column.
    if table_has_column(conn, "media_assets", "byte_size")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE media_assets ADD COLUMN byte_size INTEGER", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
