//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::scripts::model::{CallRecord, NewScript, ScriptDescriptor, ScriptKind, SmsRecord};
use crate::store::migrations;
use crate::store::traits::{Database, OperatorRecord, OperatorRole};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map an insert failure, surfacing uniqueness violations as `Constraint`.
fn insert_error(op: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {message}"))
    } else {
        DatabaseError::Query(format!("{op}: {message}"))
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn str_to_kind(s: &str) -> ScriptKind {
    match s {
        "sms" => ScriptKind::Sms,
        _ => ScriptKind::Call,
    }
}

fn str_to_role(s: &str) -> OperatorRole {
    match s {
        "admin" => OperatorRole::Admin,
        _ => OperatorRole::User,
    }
}

const SCRIPT_COLUMNS: &str = "name, kind, message, asset_path, created_at";

fn row_to_script(row: &libsql::Row) -> Result<ScriptDescriptor, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("script row parse: {e}"));
    let kind: String = row.get(1).map_err(parse)?;
    let created_at: String = row.get(4).map_err(parse)?;
    Ok(ScriptDescriptor {
        name: row.get(0).map_err(parse)?,
        kind: str_to_kind(&kind),
        message: row.get(2).map_err(parse)?,
        asset_path: row.get::<String>(3).ok(),
        created_at: parse_datetime(&created_at),
    })
}

const CALL_COLUMNS: &str = "sid, to_number, service, status, code, created_at, updated_at";

fn row_to_call(row: &libsql::Row) -> Result<CallRecord, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("call row parse: {e}"));
    let created_at: String = row.get(5).map_err(parse)?;
    let updated_at: String = row.get(6).map_err(parse)?;
    Ok(CallRecord {
        sid: row.get(0).map_err(parse)?,
        destination: row.get(1).map_err(parse)?,
        service: row.get(2).map_err(parse)?,
        status: row.get(3).map_err(parse)?,
        code: row.get::<String>(4).ok(),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Scripts ─────────────────────────────────────────────────────

    async fn insert_script(&self, script: &NewScript) -> Result<ScriptDescriptor, DatabaseError> {
        let conn = self.conn();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO scripts (name, kind, message, asset_path, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                script.name.as_str(),
                script.kind.as_str(),
                script.message.as_str(),
                opt_text(script.asset_path.as_deref()),
                created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| insert_error("insert_script", e))?;

        debug!(name = %script.name, kind = %script.kind, "Script inserted into DB");
        Ok(ScriptDescriptor {
            name: script.name.clone(),
            kind: script.kind,
            message: script.message.clone(),
            asset_path: script.asset_path.clone(),
            created_at,
        })
    }

    async fn get_script(&self, name: &str) -> Result<Option<ScriptDescriptor>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE name = ?1"),
                params![name],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_script: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_script(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_script: {e}"))),
        }
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptDescriptor>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SCRIPT_COLUMNS} FROM scripts ORDER BY created_at DESC, id DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_scripts: {e}")))?;

        let mut scripts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_scripts: {e}")))?
        {
            scripts.push(row_to_script(&row)?);
        }
        Ok(scripts)
    }

    async fn delete_script(&self, name: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute("DELETE FROM scripts WHERE name = ?1", params![name])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_script: {e}")))?;
        Ok(count > 0)
    }

    // ── Calls ───────────────────────────────────────────────────────

    async fn insert_call(&self, call: &CallRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO calls (sid, to_number, service, status, code, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                call.sid.as_str(),
                call.destination.as_str(),
                call.service.as_str(),
                call.status.as_str(),
                opt_text(call.code.as_deref()),
                call.created_at.to_rfc3339(),
                call.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| insert_error("insert_call", e))?;

        debug!(sid = %call.sid, service = %call.service, "Call inserted into DB");
        Ok(())
    }

    async fn get_call(&self, sid: &str) -> Result<Option<CallRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {CALL_COLUMNS} FROM calls WHERE sid = ?1"),
                params![sid],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_call: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_call(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_call: {e}"))),
        }
    }

    async fn update_call(
        &self,
        sid: &str,
        status: Option<&str>,
        code: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let count = conn
            .execute(
                "UPDATE calls SET status = COALESCE(?1, status), code = COALESCE(?2, code), updated_at = ?3 WHERE sid = ?4",
                params![
                    opt_text(status),
                    opt_text(code),
                    now,
                    sid,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_call: {e}")))?;
        Ok(count > 0)
    }

    // ── SMS ─────────────────────────────────────────────────────────

    async fn insert_sms(&self, sms: &SmsRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sms (sid, to_number, service, status, message, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sms.sid.as_str(),
                sms.destination.as_str(),
                opt_text(sms.service.as_deref()),
                sms.status.as_str(),
                sms.message.as_str(),
                sms.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| insert_error("insert_sms", e))?;
        Ok(())
    }

    // ── Operators ───────────────────────────────────────────────────

    async fn get_operator(&self, id: &str) -> Result<Option<OperatorRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT id, role, added_at FROM operators WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_operator: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let parse = |e: libsql::Error| DatabaseError::Query(format!("get_operator row parse: {e}"));
                let role: String = row.get(1).map_err(parse)?;
                let added_at: String = row.get(2).map_err(parse)?;
                Ok(Some(OperatorRecord {
                    id: row.get(0).map_err(parse)?,
                    role: str_to_role(&role),
                    added_at: parse_datetime(&added_at),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_operator: {e}"))),
        }
    }

    async fn upsert_operator(&self, id: &str, role: OperatorRole) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO operators (id, role, added_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET role = excluded.role",
            params![id, role.as_str(), Utc::now().to_rfc3339()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_operator: {e}")))?;
        Ok(())
    }

    async fn delete_operator(&self, id: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute("DELETE FROM operators WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_operator: {e}")))?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn call_script(name: &str) -> NewScript {
        NewScript {
            name: name.to_string(),
            kind: ScriptKind::Call,
            message: "Please enter your code".to_string(),
            asset_path: Some(NewScript::asset_path_for(name)),
        }
    }

    // ── Script tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_and_get_script() {
        let db = test_db().await;
        db.insert_script(&call_script("promo")).await.unwrap();

        let fetched = db.get_script("PROMO").await.unwrap().unwrap();
        assert_eq!(fetched.name, "promo");
        assert_eq!(fetched.kind, ScriptKind::Call);
        assert_eq!(fetched.asset_path.as_deref(), Some("en/promo/ask-promo.mp3"));
    }

    #[tokio::test]
    async fn get_script_not_found() {
        let db = test_db().await;
        assert!(db.get_script("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_script_is_constraint_error() {
        let db = test_db().await;
        db.insert_script(&call_script("promo")).await.unwrap();

        let mut other = call_script("Promo");
        other.message = "different".to_string();
        let err = db.insert_script(&other).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));

        let kept = db.get_script("promo").await.unwrap().unwrap();
        assert_eq!(kept.message, "Please enter your code");
    }

    #[tokio::test]
    async fn list_scripts_newest_first() {
        let db = test_db().await;
        db.insert_script(&call_script("first")).await.unwrap();
        db.insert_script(&NewScript {
            name: "second".to_string(),
            kind: ScriptKind::Sms,
            message: "hi".to_string(),
            asset_path: None,
        })
        .await
        .unwrap();

        let names: Vec<String> = db
            .list_scripts()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn delete_script_reports_removal() {
        let db = test_db().await;
        db.insert_script(&call_script("promo")).await.unwrap();
        assert!(db.delete_script("promo").await.unwrap());
        assert!(!db.delete_script("promo").await.unwrap());
    }

    // ── Call tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn update_call_records_code() {
        let db = test_db().await;
        db.insert_call(&CallRecord::new("CA1", "+33612345678", "paypal", "queued"))
            .await
            .unwrap();

        assert!(db.update_call("CA1", None, Some("123456")).await.unwrap());
        let call = db.get_call("CA1").await.unwrap().unwrap();
        assert_eq!(call.code.as_deref(), Some("123456"));
        assert_eq!(call.status, "queued");

        assert!(db.update_call("CA1", Some("completed"), None).await.unwrap());
        let call = db.get_call("CA1").await.unwrap().unwrap();
        assert_eq!(call.status, "completed");
        assert_eq!(call.code.as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn update_unknown_call_matches_nothing() {
        let db = test_db().await;
        assert!(!db.update_call("nope", Some("completed"), None).await.unwrap());
    }

    // ── Operator tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn upsert_operator_changes_role() {
        let db = test_db().await;
        db.upsert_operator("42", OperatorRole::User).await.unwrap();
        assert_eq!(
            db.get_operator("42").await.unwrap().unwrap().role,
            OperatorRole::User
        );

        db.upsert_operator("42", OperatorRole::Admin).await.unwrap();
        assert_eq!(
            db.get_operator("42").await.unwrap().unwrap().role,
            OperatorRole::Admin
        );

        assert!(db.delete_operator("42").await.unwrap());
        assert!(db.get_operator("42").await.unwrap().is_none());
    }
}
