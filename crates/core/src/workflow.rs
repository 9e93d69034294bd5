use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AppointmentStatus, NewAppointment};
use crate::validation::{ValidationError, Validator};

/// Status an appointment takes when it is written with or without a date.
///
/// Any previous status is discarded, so re-saving a completed or cancelled
/// order brings it back to `Pending`/`Scheduled`.
pub fn status_for_schedule(date: Option<&DateTime<Utc>>) -> AppointmentStatus {
    match date {
        Some(_) => AppointmentStatus::Scheduled,
        None => AppointmentStatus::Pending,
    }
}

/// Operator actions that close an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Complete,
    Cancel,
}

impl Transition {
    pub fn target(self) -> AppointmentStatus {
        match self {
            Self::Complete => AppointmentStatus::Completed,
            Self::Cancel => AppointmentStatus::Cancelled,
        }
    }

    /// Maps a requested status onto a manual transition.
    ///
    /// `Pending` and `Scheduled` are derived from the date and cannot be set by hand.
    pub fn from_status(status: AppointmentStatus) -> Option<Self> {
        match status {
            AppointmentStatus::Completed => Some(Self::Complete),
            AppointmentStatus::Cancelled => Some(Self::Cancel),
            AppointmentStatus::Pending | AppointmentStatus::Scheduled => None,
        }
    }
}

/// Whether the operator books a date now or leaves the order pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingMode {
    #[default]
    Now,
    Later,
}

/// Date and time as picked in the scheduling form, in business-local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub mode: SchedulingMode,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("date and time are required to schedule")]
    MissingDateTime,
    #[error("{0} does not exist in the business timezone")]
    NonexistentLocalTime(String),
}

impl ScheduleRequest {
    pub fn later() -> Self {
        Self {
            mode: SchedulingMode::Later,
            date: None,
            time: None,
        }
    }

    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            mode: SchedulingMode::Now,
            date: Some(date),
            time: Some(time),
        }
    }

    /// Resolves the form into a UTC instant, or `None` for a pending order.
    pub fn resolve(&self, tz: Tz) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        match self.mode {
            SchedulingMode::Later => Ok(None),
            SchedulingMode::Now => {
                let (Some(date), Some(time)) = (self.date, self.time) else {
                    return Err(ScheduleError::MissingDateTime);
                };
                let local = date.and_time(time);
                tz.from_local_datetime(&local)
                    .earliest()
                    .map(|value| Some(value.with_timezone(&Utc)))
                    .ok_or_else(|| ScheduleError::NonexistentLocalTime(local.to_string()))
            }
        }
    }
}

/// Appointment form as submitted for both creation and full edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub ac_id: String,
    /// An omitted schedule leaves the order pending.
    #[serde(default = "ScheduleRequest::later")]
    pub schedule: ScheduleRequest,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AppointmentDraft {
    /// Validates the form and derives the status from the resolved date.
    pub fn into_new(self, tz: Tz) -> Result<NewAppointment, ValidationError> {
        let mut validator = Validator::new();
        validator
            .require("client_id", &self.client_id)
            .require("product_id", &self.product_id)
            .require("ac_id", &self.ac_id);

        let date = match self.schedule.resolve(tz) {
            Ok(date) => date,
            Err(err) => {
                validator.reject("schedule", &err.to_string());
                None
            }
        };
        validator.finish()?;

        let notes = self.notes.filter(|value| !value.trim().is_empty());
        Ok(NewAppointment {
            client_id: self.client_id,
            product_id: self.product_id,
            ac_id: self.ac_id,
            date,
            notes,
        })
    }
}
