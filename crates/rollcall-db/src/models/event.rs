//! Event model.

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::{TenantAware, TenantId};
use rollcall_provider::SourceKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

/// An event discovered from (or previously committed for) a tenant.
///
/// Sync identity is `(tenant_id, source_id)` — the source id is a content
/// address, so rediscovering the same source updates the existing row, never
/// duplicates it. The unique index enforces at most one live event per
/// source id per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub source_kind: String,
    pub source_id: String,
    pub name: String,
    pub starts_on: NaiveDate,
    pub event_type_id: Option<Uuid>,
    /// Point value of the event: its own, or inherited from its event type
    /// at discovery time.
    pub points: i32,
    /// Provider field id to tenant property id assignment
    /// (`HashMap<String, Uuid>`).
    pub field_mapping: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantAware for Event {
    fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant_id)
    }
}

impl Event {
    /// Parse the source kind enum.
    #[must_use]
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source_kind.parse().ok()
    }

    /// Parse the field mapping.
    #[must_use]
    pub fn field_mapping(&self) -> HashMap<String, Uuid> {
        serde_json::from_value(self.field_mapping.clone()).unwrap_or_default()
    }

    /// List all events for a tenant.
    pub async fn list_for_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM events
            WHERE tenant_id = $1
            ORDER BY starts_on, created_at
            ",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Insert or update an event by its sync identity.
    pub async fn upsert(conn: &mut PgConnection, event: &Event) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO events (
                id, tenant_id, source_kind, source_id, name, starts_on,
                event_type_id, points, field_mapping
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id, source_id) DO UPDATE
            SET name = EXCLUDED.name,
                starts_on = EXCLUDED.starts_on,
                event_type_id = EXCLUDED.event_type_id,
                points = EXCLUDED.points,
                field_mapping = EXCLUDED.field_mapping,
                updated_at = NOW()
            ",
        )
        .bind(event.id)
        .bind(event.tenant_id)
        .bind(&event.source_kind)
        .bind(&event.source_id)
        .bind(&event.name)
        .bind(event.starts_on)
        .bind(event.event_type_id)
        .bind(event.points)
        .bind(&event.field_mapping)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Delete events by id.
    pub async fn delete_by_ids(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM events
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_accessor() {
        let mut event = Event {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            source_kind: "form".to_string(),
            source_id: "1AbC".to_string(),
            name: "Kickoff".to_string(),
            starts_on: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            event_type_id: None,
            points: 10,
            field_mapping: JsonValue::Object(serde_json::Map::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(event.source_kind(), Some(SourceKind::Form));

        event.source_kind = "hologram".to_string();
        assert_eq!(event.source_kind(), None);
    }

    #[test]
    fn test_field_mapping_accessor() {
        let prop = Uuid::new_v4();
        let event = Event {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            source_kind: "spreadsheet".to_string(),
            source_id: "1AbC".to_string(),
            name: "Kickoff".to_string(),
            starts_on: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            event_type_id: None,
            points: 10,
            field_mapping: serde_json::json!({ "c2": prop }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mapping = event.field_mapping();
        assert_eq!(mapping.get("c2"), Some(&prop));
    }
}
