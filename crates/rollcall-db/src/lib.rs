//! # rollcall Database Layer
//!
//! sqlx/Postgres persistence for rollcall's collections: tenants, event
//! types, events, members, attendance buckets, dashboards, and quota
//! records.
//!
//! Models follow a uniform shape: a `sqlx::FromRow` struct per collection
//! with inherent async methods for the point lookups, filtered reads, and
//! bulk writes the sync engine needs. Methods that must participate in the
//! engine's commit transaction take `&mut PgConnection` so callers can pass
//! `&mut *tx`; standalone reads take `&PgPool`.
//!
//! JSONB columns (property schemas, field mappings, attendance entries)
//! stay `serde_json::Value` in the row structs, with typed accessors that
//! parse on demand and default on malformed data.

pub mod models;

pub use models::{
    AttendanceBucket, AttendanceEntry, Dashboard, Event, EventType, Member, MemberProperty,
    PointType, QuotaRecord, Tenant,
};
