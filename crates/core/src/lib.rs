//! Domain layer for the certificate issuance back office.
//!
//! Everything here is pure: entity types, the appointment workflow, the
//! order projection and the aggregations behind the dashboard. Storage and
//! HTTP concerns live in the sibling crates.

pub mod dashboard;
pub mod filters;
pub mod projector;
pub mod types;
pub mod validation;
pub mod workflow;

pub use dashboard::{ChartSlice, DashboardStats, ReportMonth, ReportMonthError};
pub use projector::{sort_for_agenda, OrderDisplay, OrderSources, Projector};
pub use validation::{FieldError, ValidationError};
pub use workflow::{AppointmentDraft, ScheduleError, ScheduleRequest, SchedulingMode, Transition};
