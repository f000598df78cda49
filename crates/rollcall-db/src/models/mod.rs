//! Persistence models, one file per collection.

pub mod attendance_bucket;
pub mod dashboard;
pub mod event;
pub mod event_type;
pub mod member;
pub mod quota;
pub mod tenant;

pub use attendance_bucket::{AttendanceBucket, AttendanceEntry};
pub use dashboard::Dashboard;
pub use event::Event;
pub use event_type::EventType;
pub use member::{Member, MemberProperty};
pub use quota::QuotaRecord;
pub use tenant::{PointType, Tenant};
