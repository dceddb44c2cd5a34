use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::booking::{Booking, BookingRequest, BookingStatus, TimeRange};
use crate::holiday::{holiday_on, Holiday};
use crate::resource::{BookingMode, ResourceIndex};
use crate::slot::{open_slots, Slot};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingRejection {
    #[error("unknown resource {0}")]
    UnknownResource(Uuid),
    #[error("the resource is closed on {date} ({name})")]
    Holiday { date: NaiveDate, name: String },
    #[error("the resource can only be booked in its slots and no slot on {date} covers {range}")]
    OutsideSlots { date: NaiveDate, range: TimeRange },
    #[error("{range} on {date} overlaps the booking {booking_id} of resource {resource_id}")]
    Conflict {
        date: NaiveDate,
        range: TimeRange,
        booking_id: Uuid,
        resource_id: Uuid,
    },
}

/// Blocking bookings on the same day that overlap the request on the
/// resource itself, its whole or its parts.
#[must_use]
pub fn find_conflicts<'a>(
    request: &BookingRequest,
    index: &ResourceIndex,
    existing: &'a [Booking],
) -> Vec<&'a Booking> {
    let blocking = index.blocking_resources(request.resource_id);
    existing
        .iter()
        .filter(|booking| Some(booking.id) != request.replaces)
        .filter(|booking| booking.status.blocks_resource())
        .filter(|booking| booking.date == request.date)
        .filter(|booking| blocking.contains(&booking.resource_id))
        .filter(|booking| booking.range.overlaps(&request.range))
        .collect()
}

/// Checks whether the request may be stored: the resource exists, a
/// slot-only resource is booked inside one of its slots and no blocking
/// booking overlaps.
pub fn check_booking(
    request: &BookingRequest,
    index: &ResourceIndex,
    existing: &[Booking],
    slots: &[Slot],
    holidays: &[Holiday],
) -> Result<(), BookingRejection> {
    let resource = index
        .get(request.resource_id)
        .ok_or(BookingRejection::UnknownResource(request.resource_id))?;

    if resource.booking_mode == BookingMode::SlotOnly {
        if let Some(holiday) = holiday_on(holidays, request.date) {
            return Err(BookingRejection::Holiday {
                date: request.date,
                name: holiday.name.clone(),
            });
        }
        let covered = open_slots(slots, resource.id, request.date, holidays)
            .iter()
            .any(|slot| slot.matches(request.date, &request.range));
        if !covered {
            return Err(BookingRejection::OutsideSlots {
                date: request.date,
                range: request.range,
            });
        }
    }

    match find_conflicts(request, index, existing).first() {
        Some(conflict) => Err(BookingRejection::Conflict {
            date: request.date,
            range: request.range,
            booking_id: conflict.id,
            resource_id: conflict.resource_id,
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupation {
    pub booking_id: Uuid,
    pub resource_id: Uuid,
    pub range: TimeRange,
    pub status: BookingStatus,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub resource_id: Uuid,
    pub date: NaiveDate,
    pub booking_mode: BookingMode,
    pub holiday: Option<String>,
    /// Blocking bookings of the resource and of the resources it shares
    /// space with, ordered by start time.
    pub occupied: Vec<Occupation>,
    /// Offered slots for slot-only resources, empty otherwise.
    pub open_slots: Vec<TimeRange>,
}

pub fn day_schedule(
    resource_id: Uuid,
    date: NaiveDate,
    index: &ResourceIndex,
    existing: &[Booking],
    slots: &[Slot],
    holidays: &[Holiday],
) -> Result<DaySchedule, BookingRejection> {
    let resource = index
        .get(resource_id)
        .ok_or(BookingRejection::UnknownResource(resource_id))?;
    let blocking = index.blocking_resources(resource_id);

    let mut occupied: Vec<Occupation> = existing
        .iter()
        .filter(|booking| booking.date == date && booking.status.blocks_resource())
        .filter(|booking| blocking.contains(&booking.resource_id))
        .map(|booking| Occupation {
            booking_id: booking.id,
            resource_id: booking.resource_id,
            range: booking.range,
            status: booking.status,
            title: booking.title.clone(),
        })
        .collect();
    occupied.sort_by_key(|occupation| occupation.range);

    let open_slots = match resource.booking_mode {
        BookingMode::Free => Vec::new(),
        BookingMode::SlotOnly => open_slots(slots, resource_id, date, holidays)
            .into_iter()
            .map(|slot| slot.range)
            .collect(),
    };

    Ok(DaySchedule {
        resource_id,
        date,
        booking_mode: resource.booking_mode,
        holiday: holiday_on(holidays, date).map(|holiday| holiday.name.clone()),
        occupied,
        open_slots,
    })
}
