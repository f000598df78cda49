//! Tenant model: the unit of data isolation, quota, and sync locking.

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_provider::PropertyType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// A point type: a named date window during which attended events accrue
/// points (e.g. "Fall 2026"). Stored in the tenant's `point_types` JSONB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointType {
    pub id: Uuid,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl PointType {
    /// Whether an event on `date` falls in this window (inclusive bounds).
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.starts_on <= date && date <= self.ends_on
    }
}

/// A tenant organization.
///
/// `sync_lock` is the sole concurrency gate for synchronization: exactly one
/// sync may run per tenant at a time, and lock state lives only in this row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub sync_lock: bool,
    /// Source id of the tenant's designated origin event, whose submitted
    /// data overrides member properties.
    pub origin_source_id: Option<String>,
    /// Member property schema (`Vec<PropertyType>`).
    pub properties: JsonValue,
    /// Point type windows (`Vec<PointType>`).
    pub point_types: JsonValue,
    /// Reference to the last published report, if any.
    pub report_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Parse the member property schema.
    #[must_use]
    pub fn property_types(&self) -> Vec<PropertyType> {
        serde_json::from_value(self.properties.clone()).unwrap_or_default()
    }

    /// Parse the point type windows.
    #[must_use]
    pub fn point_types(&self) -> Vec<PointType> {
        serde_json::from_value(self.point_types.clone()).unwrap_or_default()
    }

    /// Create a new tenant.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        properties: &[PropertyType],
        point_types: &[PointType],
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO tenants (name, properties, point_types)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(name)
        .bind(serde_json::to_value(properties).unwrap_or_default())
        .bind(serde_json::to_value(point_types).unwrap_or_default())
        .fetch_one(pool)
        .await
    }

    /// Find a tenant by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM tenants WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Atomically take the sync lock.
    ///
    /// Compare-and-set semantics: the UPDATE only matches when the lock is
    /// currently unset, so a concurrent attempt loses by matching zero rows.
    /// Returns the locked tenant row, or `None` when the tenant is missing
    /// or already locked.
    pub async fn acquire_sync_lock(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE tenants
            SET sync_lock = TRUE, updated_at = NOW()
            WHERE id = $1 AND sync_lock = FALSE
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Clear the sync lock. Returns whether a row was updated.
    pub async fn release_sync_lock(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE tenants
            SET sync_lock = FALSE, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the reference returned by the report service.
    pub async fn set_report_ref(
        pool: &PgPool,
        id: Uuid,
        report_ref: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE tenants
            SET report_ref = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(report_ref)
        .execute(pool)
        .await?;

        Ok(())
    }
}
