use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, ffi, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const USER_COLUMNS: &str = "id, email, created_at";
const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at";
const BUCKET_COLUMNS: &str = "id, owner_id, name, created_at";
const FILE_COLUMNS: &str =
    "id, bucket_id, name, size_bytes, content_type, checksum, uploaded_at, uploaded_by";
const GRANT_COLUMNS: &str = "id, bucket_id, grantee_id, level, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Translates constraint violations into domain errors: unique indexes become
/// `DuplicateName`, a vanished parent row becomes `NotFound`.
fn map_constraint(e: rusqlite::Error) -> Error {
    let extended = match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            Some(err.extended_code)
        }
        _ => None,
    };

    match extended {
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
            Error::DuplicateName
        }
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => Error::NotFound,
        _ => Error::Database(e),
    }
}

impl ToSql for PermissionLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PermissionLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        PermissionLevel::parse(s).ok_or_else(|| {
            FromSqlError::Other(Box::new(Error::InvalidPermissionLevel(s.to_string())))
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        user_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

fn bucket_from_row(row: &Row<'_>) -> rusqlite::Result<Bucket> {
    Ok(Bucket {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        bucket_id: row.get(1)?,
        name: row.get(2)?,
        size_bytes: row.get(3)?,
        content_type: row.get(4)?,
        checksum: row.get(5)?,
        uploaded_at: parse_datetime(&row.get::<_, String>(6)?),
        uploaded_by: row.get(7)?,
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<PermissionGrant> {
    Ok(PermissionGrant {
        id: row.get(0)?,
        bucket_id: row.get(1)?,
        grantee_id: row.get(2)?,
        level: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                params![user.id, user.email.trim(), format_datetime(&user.created_at)],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email.trim()],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.is_admin,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_admin_token(&self) -> Result<bool> {
        let count: i32 = self.conn().query_row(
            "SELECT COUNT(*) FROM tokens WHERE is_admin = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Bucket operations

    fn create_bucket(&self, bucket: &Bucket) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO buckets (id, owner_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    bucket.id,
                    bucket.owner_id,
                    bucket.name,
                    format_datetime(&bucket.created_at),
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_bucket(&self, id: &str) -> Result<Option<Bucket>> {
        self.conn()
            .query_row(
                &format!("SELECT {BUCKET_COLUMNS} FROM buckets WHERE id = ?1"),
                params![id],
                bucket_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_bucket_by_name(&self, owner_id: &str, name: &str) -> Result<Option<Bucket>> {
        self.conn()
            .query_row(
                &format!("SELECT {BUCKET_COLUMNS} FROM buckets WHERE owner_id = ?1 AND name = ?2"),
                params![owner_id, name],
                bucket_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_owned_buckets(&self, owner_id: &str) -> Result<Vec<Bucket>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BUCKET_COLUMNS} FROM buckets WHERE owner_id = ?1 ORDER BY name"
        ))?;

        let rows = stmt.query_map(params![owner_id], bucket_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn rename_bucket(&self, id: &str, new_name: &str) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE buckets SET name = ?1 WHERE id = ?2",
                params![new_name, id],
            )
            .map_err(map_constraint)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_bucket(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM permission_grants WHERE bucket_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM files WHERE bucket_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM buckets WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn bucket_usage(&self, bucket_id: &str) -> Result<BucketUsage> {
        let (file_count, total_size) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM files WHERE bucket_id = ?1",
            params![bucket_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(BucketUsage {
            file_count,
            total_size,
        })
    }

    // File operations

    fn create_file(&self, file: &FileRecord) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO files ({FILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    file.id,
                    file.bucket_id,
                    file.name,
                    file.size_bytes,
                    file.content_type,
                    file.checksum,
                    format_datetime(&file.uploaded_at),
                    file.uploaded_by,
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_file(&self, id: &str) -> Result<Option<FileRecord>> {
        self.conn()
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
                params![id],
                file_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_bucket_files(&self, bucket_id: &str) -> Result<Vec<FileRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE bucket_id = ?1 ORDER BY name, id"
        ))?;

        let rows = stmt.query_map(params![bucket_id], file_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn rename_file(&self, id: &str, new_name: &str) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE files SET name = ?1 WHERE id = ?2",
                params![new_name, id],
            )
            .map_err(map_constraint)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_file(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM files WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Permission grant operations

    fn upsert_grant(&self, grant: &PermissionGrant) -> Result<(PermissionGrant, bool)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let owner_id: String = tx
            .query_row(
                "SELECT owner_id FROM buckets WHERE id = ?1",
                params![grant.bucket_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        if owner_id == grant.grantee_id {
            return Err(Error::SelfShareRejected);
        }

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM permission_grants WHERE bucket_id = ?1 AND grantee_id = ?2",
                params![grant.bucket_id, grant.grantee_id],
                |row| row.get(0),
            )
            .optional()?;

        tx.execute(
            "INSERT INTO permission_grants (id, bucket_id, grantee_id, level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (bucket_id, grantee_id) DO UPDATE SET
                level = excluded.level,
                updated_at = excluded.updated_at",
            params![
                grant.id,
                grant.bucket_id,
                grant.grantee_id,
                grant.level,
                format_datetime(&grant.created_at),
                format_datetime(&grant.updated_at),
            ],
        )
        .map_err(map_constraint)?;

        let stored = tx.query_row(
            &format!(
                "SELECT {GRANT_COLUMNS} FROM permission_grants WHERE bucket_id = ?1 AND grantee_id = ?2"
            ),
            params![grant.bucket_id, grant.grantee_id],
            grant_from_row,
        )?;

        tx.commit()?;
        Ok((stored, existing.is_none()))
    }

    fn get_grant(&self, id: &str) -> Result<Option<PermissionGrant>> {
        self.conn()
            .query_row(
                &format!("SELECT {GRANT_COLUMNS} FROM permission_grants WHERE id = ?1"),
                params![id],
                grant_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_grant_for(
        &self,
        bucket_id: &str,
        grantee_id: &str,
    ) -> Result<Option<PermissionGrant>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {GRANT_COLUMNS} FROM permission_grants WHERE bucket_id = ?1 AND grantee_id = ?2"
                ),
                params![bucket_id, grantee_id],
                grant_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_grant_level(&self, id: &str, level: PermissionLevel) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE permission_grants SET level = ?1, updated_at = ?2 WHERE id = ?3",
            params![level, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_grant(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM permission_grants WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_bucket_grants(&self, bucket_id: &str) -> Result<Vec<PermissionGrant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GRANT_COLUMNS} FROM permission_grants WHERE bucket_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![bucket_id], grant_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_grants(&self, grantee_id: &str) -> Result<Vec<PermissionGrant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GRANT_COLUMNS} FROM permission_grants WHERE grantee_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![grantee_id], grant_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
