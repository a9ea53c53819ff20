//! Operator authorization backed by the operators table.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::DatabaseError;
use crate::store::{Database, OperatorRole};

/// Resolves and manages operator roles.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Role of the operator, or `None` when they are not registered.
    async fn role(&self, operator: &str) -> Result<Option<OperatorRole>, DatabaseError>;

    async fn grant(&self, operator: &str, role: OperatorRole) -> Result<(), DatabaseError>;

    /// Returns whether the operator was registered.
    async fn revoke(&self, operator: &str) -> Result<bool, DatabaseError>;
}

pub struct StoreAuthorizer {
    db: Arc<dyn Database>,
}

impl StoreAuthorizer {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Grant the admin role to every listed operator.
    pub async fn seed_admins(&self, ids: &[String]) -> Result<usize, DatabaseError> {
        for id in ids {
            self.db.upsert_operator(id, OperatorRole::Admin).await?;
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "Seeded bot admins");
        }
        Ok(ids.len())
    }
}

#[async_trait]
impl Authorizer for StoreAuthorizer {
    async fn role(&self, operator: &str) -> Result<Option<OperatorRole>, DatabaseError> {
        Ok(self.db.get_operator(operator).await?.map(|op| op.role))
    }

    async fn grant(&self, operator: &str, role: OperatorRole) -> Result<(), DatabaseError> {
        self.db.upsert_operator(operator, role).await
    }

    async fn revoke(&self, operator: &str) -> Result<bool, DatabaseError> {
        self.db.delete_operator(operator).await
    }
}
