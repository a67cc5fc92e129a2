use directories::ProjectDirs;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

mod tokens;

pub(crate) use tokens::{clear_token_row, load_token_row, upsert_token_row, TokenRow};

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "Filebox";
const APPLICATION: &str = "Filebox";
const DB_FILE_NAME: &str = "session.db";

pub type StorageResult<T> = Result<T, String>;

/// 打开（必要时创建）指定路径上的数据库并应用建表语句。
/// 客户端侧写入频率很低，每次操作短连接即可。
pub(crate) fn open_connection(path: &Path) -> StorageResult<Connection> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| format!("failed to create database directory {dir:?}: {e}"))?;
    }

    let conn =
        Connection::open(path).map_err(|e| format!("failed to open SQLite database: {e}"))?;
    apply_migrations(&conn)?;
    Ok(conn)
}

fn apply_migrations(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(tokens::TOKEN_TABLE_SCHEMA)
        .map_err(|e| format!("failed to initialize database schema: {e}"))?;
    Ok(())
}

/// 默认数据库位置：平台约定的应用数据目录。
pub(crate) fn default_database_path() -> StorageResult<PathBuf> {
    let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or_else(|| "failed to resolve application data directory".to_string())?;
    Ok(dirs.data_dir().join(DB_FILE_NAME))
}

pub(crate) fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
