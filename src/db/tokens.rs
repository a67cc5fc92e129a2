use rusqlite::{params, Connection, OptionalExtension};

use super::{current_timestamp_millis, StorageResult};

/// 令牌持久化模块：auth_tokens 表只保留一行，access 与 refresh
/// 两列都是 NOT NULL——要么成对写入，要么整行删除，不存在半对状态。

pub(crate) const TOKEN_TABLE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS auth_tokens (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    updated_at_millis INTEGER NOT NULL
);";

#[derive(Debug, Clone)]
pub(crate) struct TokenRow {
    pub access_token: String,
    pub refresh_token: String,
}

pub(crate) fn upsert_token_row(conn: &Connection, access: &str, refresh: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO auth_tokens (id, access_token, refresh_token, updated_at_millis)
        VALUES (1, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            updated_at_millis = excluded.updated_at_millis",
        params![access, refresh, current_timestamp_millis()],
    )
    .map_err(|e| format!("failed to upsert auth tokens: {e}"))?;
    Ok(())
}

pub(crate) fn load_token_row(conn: &Connection) -> StorageResult<Option<TokenRow>> {
    conn.query_row(
        "SELECT access_token, refresh_token FROM auth_tokens WHERE id = 1",
        [],
        |row| {
            Ok(TokenRow {
                access_token: row.get(0)?,
                refresh_token: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(|e| format!("failed to read auth tokens: {e}"))
}

pub(crate) fn clear_token_row(conn: &Connection) -> StorageResult<()> {
    conn.execute("DELETE FROM auth_tokens WHERE id = 1", [])
        .map_err(|e| format!("failed to clear auth tokens: {e}"))?;
    Ok(())
}
