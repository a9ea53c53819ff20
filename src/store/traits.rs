//! `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::scripts::model::{CallRecord, NewScript, ScriptDescriptor, SmsRecord};

/// Role of a control-bot operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorRole {
    User,
    Admin,
}

impl OperatorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for OperatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorRecord {
    pub id: String,
    pub role: OperatorRole,
    pub added_at: DateTime<Utc>,
}

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Scripts ─────────────────────────────────────────────────────

    /// Insert a script. A name already taken (case-insensitively) fails with
    /// `DatabaseError::Constraint` and leaves the existing row untouched.
    async fn insert_script(&self, script: &NewScript) -> Result<ScriptDescriptor, DatabaseError>;

    /// Get a script by name (case-insensitive).
    async fn get_script(&self, name: &str) -> Result<Option<ScriptDescriptor>, DatabaseError>;

    /// All scripts, newest first.
    async fn list_scripts(&self) -> Result<Vec<ScriptDescriptor>, DatabaseError>;

    /// Delete a script. Returns whether a row was removed.
    async fn delete_script(&self, name: &str) -> Result<bool, DatabaseError>;

    // ── Calls ───────────────────────────────────────────────────────

    async fn insert_call(&self, call: &CallRecord) -> Result<(), DatabaseError>;

    async fn get_call(&self, sid: &str) -> Result<Option<CallRecord>, DatabaseError>;

    /// Update status and/or captured code. `None` leaves a field unchanged.
    /// Returns whether a call matched.
    async fn update_call(
        &self,
        sid: &str,
        status: Option<&str>,
        code: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    // ── SMS ─────────────────────────────────────────────────────────

    async fn insert_sms(&self, sms: &SmsRecord) -> Result<(), DatabaseError>;

    // ── Operators ───────────────────────────────────────────────────

    async fn get_operator(&self, id: &str) -> Result<Option<OperatorRecord>, DatabaseError>;

    /// Insert an operator or change its role.
    async fn upsert_operator(&self, id: &str, role: OperatorRole) -> Result<(), DatabaseError>;

    /// Returns whether an operator was removed.
    async fn delete_operator(&self, id: &str) -> Result<bool, DatabaseError>;
}
