use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // Migration 1: client-local session storage
    "CREATE TABLE IF NOT EXISTS session_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );",
];

/// Apply every migration newer than the recorded schema version.
/// Each step commits together with its version row.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<usize> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?;

    let mut applied = 0;
    for (version, sql) in (1_i64..).zip(MIGRATIONS.iter()) {
        if version <= current {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO _migrations (version) VALUES (?1)", [version])?;
        tx.commit()?;
        tracing::info!("Applied session store migration {version}");
        applied += 1;
    }

    Ok(applied)
}
