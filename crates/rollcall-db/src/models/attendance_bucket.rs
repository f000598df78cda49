//! Attendance bucket model: capacity-bounded pages of a member's
//! attendance history.

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::{TenantAware, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// One attended event in a member's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub event_id: Uuid,
    pub source_id: String,
    pub event_name: String,
    pub occurred_on: NaiveDate,
    pub points: i32,
}

/// A page of a member's attendance history.
///
/// A member's full history is the concatenation of its buckets in
/// `page_index` order. Buckets exist purely to bound row size; every sync
/// repaginates them from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceBucket {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub page_index: i32,
    /// `Vec<AttendanceEntry>` in discovery order.
    pub entries: JsonValue,
    pub entry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantAware for AttendanceBucket {
    fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant_id)
    }
}

impl AttendanceBucket {
    /// Parse the entry list.
    #[must_use]
    pub fn entries(&self) -> Vec<AttendanceEntry> {
        serde_json::from_value(self.entries.clone()).unwrap_or_default()
    }

    /// List all buckets for a tenant, in member then page order.
    pub async fn list_for_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM attendance_buckets
            WHERE tenant_id = $1
            ORDER BY member_id, page_index
            ",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Insert or update a bucket page.
    pub async fn upsert(conn: &mut PgConnection, bucket: &AttendanceBucket) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO attendance_buckets (
                id, tenant_id, member_id, page_index, entries, entry_count
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (member_id, page_index) DO UPDATE
            SET entries = EXCLUDED.entries,
                entry_count = EXCLUDED.entry_count,
                updated_at = NOW()
            ",
        )
        .bind(bucket.id)
        .bind(bucket.tenant_id)
        .bind(bucket.member_id)
        .bind(bucket.page_index)
        .bind(&bucket.entries)
        .bind(bucket.entry_count)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Delete bucket pages by id.
    pub async fn delete_by_ids(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM attendance_buckets
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
    fn test_entries_accessor_roundtrip() {
        let entries = vec![AttendanceEntry {
            event_id: Uuid::new_v4(),
            source_id: "1AbC".to_string(),
            event_name: "Kickoff".to_string(),
            occurred_on: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            points: 10,
        }];
        let bucket = AttendanceBucket {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            page_index: 0,
            entries: serde_json::to_value(&entries).unwrap(),
            entry_count: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(bucket.entries(), entries);
    }
}
