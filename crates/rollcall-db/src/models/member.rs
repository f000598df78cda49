//! Member model.

use chrono::{DateTime, Utc};
use rollcall_core::{TenantAware, TenantId};
use rollcall_provider::PropertyValue;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

/// One property held by a member.
///
/// `is_override` marks a manually-set value: provider data must not
/// overwrite it unless it originates from the tenant's origin event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProperty {
    pub value: PropertyValue,
    #[serde(rename = "override", default)]
    pub is_override: bool,
}

impl MemberProperty {
    /// A provider-supplied (non-override) property value.
    #[must_use]
    pub fn synced(value: PropertyValue) -> Self {
        Self {
            value,
            is_override: false,
        }
    }

    /// A manually-set or origin-event property value.
    #[must_use]
    pub fn overridden(value: PropertyValue) -> Self {
        Self {
            value,
            is_override: true,
        }
    }
}

/// An audience member of a tenant.
///
/// Domain identity is `(tenant_id, member_key)` — the tenant-unique value of
/// the member-id property. Properties and per-point-type totals are JSONB
/// maps keyed by property/point-type id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_key: String,
    /// `HashMap<Uuid, MemberProperty>` keyed by property type id.
    pub properties: JsonValue,
    /// `HashMap<Uuid, i64>` keyed by point type id.
    pub point_totals: JsonValue,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantAware for Member {
    fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant_id)
    }
}

impl Member {
    /// Parse the property map.
    #[must_use]
    pub fn properties(&self) -> HashMap<Uuid, MemberProperty> {
        serde_json::from_value(self.properties.clone()).unwrap_or_default()
    }

    /// Parse the point totals map.
    #[must_use]
    pub fn point_totals(&self) -> HashMap<Uuid, i64> {
        serde_json::from_value(self.point_totals.clone()).unwrap_or_default()
    }

    /// Total points across all point types.
    #[must_use]
    pub fn total_points(&self) -> i64 {
        self.point_totals().values().sum()
    }

    /// List all members for a tenant.
    pub async fn list_for_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM members
            WHERE tenant_id = $1
            ORDER BY member_key
            ",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Insert or update a member by its domain identity.
    pub async fn upsert(conn: &mut PgConnection, member: &Member) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO members (
                id, tenant_id, member_key, properties, point_totals, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, member_key) DO UPDATE
            SET properties = EXCLUDED.properties,
                point_totals = EXCLUDED.point_totals,
                last_synced_at = EXCLUDED.last_synced_at,
                updated_at = NOW()
            ",
        )
        .bind(member.id)
        .bind(member.tenant_id)
        .bind(&member.member_key)
        .bind(&member.properties)
        .bind(&member.point_totals)
        .bind(member.last_synced_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Delete members by id.
    pub async fn delete_by_ids(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM members
            WHERE tenant_id = $1 AND id = ANY($2)
            ",
        )
        .bind(tenant_id)
        .bind(ids)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}
