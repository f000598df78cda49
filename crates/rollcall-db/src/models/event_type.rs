//! Event type model: a category of events sharing a point value and
//! discovery folders.

use chrono::{DateTime, Utc};
use rollcall_core::{TenantAware, TenantId};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// An event category owned by a tenant.
///
/// `source_folders` is the list of folder ids discovery traverses for this
/// type; it is rewritten during sync as folders are admitted or pruned.
/// The tie-break claim count used during discovery is transient engine
/// state and is never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventType {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub points: i32,
    pub source_folders: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantAware for EventType {
    fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant_id)
    }
}

impl EventType {
    /// Create a new event type.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        name: &str,
        points: i32,
        source_folders: &[String],
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO event_types (tenant_id, name, points, source_folders)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(tenant_id)
        .bind(name)
        .bind(points)
        .bind(source_folders)
        .fetch_one(pool)
        .await
    }

    /// List all event types for a tenant.
    pub async fn list_for_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM event_types
            WHERE tenant_id = $1
            ORDER BY created_at
            ",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Rewrite the folder list of an event type (sync commit path).
    pub async fn update_source_folders(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
        source_folders: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE event_types
            SET source_folders = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(source_folders)
        .execute(conn)
        .await?;

        Ok(())
    }
}
