//! Booking rules of the facility booking application. Nothing in here
//! touches the database, callers load the relevant rows and pass them in.

pub mod availability;
pub mod booking;
pub mod error;
pub mod holiday;
pub mod ical;
pub mod organization;
pub mod resource;
pub mod series;
pub mod slot;
pub mod trainer;

pub use availability::{check_booking, day_schedule, BookingRejection, DaySchedule};
pub use booking::{Booking, BookingRequest, BookingStatus, TimeRange};
pub use error::DomainError;
pub use holiday::Holiday;
pub use resource::{BookingMode, Resource, ResourceIndex};
pub use series::{plan_series, SeriesPattern, SeriesPlan, SeriesRejection, SeriesRequest};
pub use slot::Slot;
pub use trainer::{trainer_status, Compliance, TrainerFlags, TrainerStatus};
