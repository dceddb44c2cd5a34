//! RFC 5545 rendering of the public resource calendars.

use chrono::{DateTime, Days, NaiveDate, Utc};
use itertools::Itertools;

use crate::booking::{Booking, BookingStatus};

const MAX_LINE_OCTETS: usize = 75;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSettings {
    pub product_id: String,
    /// Right hand side of every `UID`.
    pub host: String,
    /// Announced as `X-WR-TIMEZONE`, event times themselves are floating.
    pub timezone: String,
    pub window_days: u64,
}

/// Escapes a TEXT value.
#[must_use]
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

/// Splits a content line into chunks of at most 75 octets, never inside a
/// UTF-8 sequence. Continuation lines start with a single space.
fn fold_line(line: &str, out: &mut String) {
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;
    for c in line.chars() {
        if used + c.len_utf8() > budget {
            out.push_str("\r\n ");
            // the leading space counts
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        out.push(c);
        used += c.len_utf8();
    }
    out.push_str("\r\n");
}

/// Renders approved bookings in `[today, today + window_days)` as a
/// `VCALENDAR` named `name`.
#[must_use]
pub fn render_calendar(
    name: &str,
    bookings: &[Booking],
    today: NaiveDate,
    stamp: DateTime<Utc>,
    settings: &CalendarSettings,
) -> String {
    let window_end = today
        .checked_add_days(Days::new(settings.window_days))
        .unwrap_or(NaiveDate::MAX);
    let dtstamp = stamp.format("%Y%m%dT%H%M%SZ").to_string();

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_owned(),
        "VERSION:2.0".to_owned(),
        format!("PRODID:{}", settings.product_id),
        "CALSCALE:GREGORIAN".to_owned(),
        "METHOD:PUBLISH".to_owned(),
        format!("X-WR-CALNAME:{}", escape_text(name)),
        format!("X-WR-TIMEZONE:{}", settings.timezone),
    ];

    for booking in bookings
        .iter()
        .filter(|booking| booking.status == BookingStatus::Approved)
        .filter(|booking| today <= booking.date && booking.date < window_end)
        .sorted_by_key(|booking| (booking.date, booking.range, booking.id))
    {
        let start = booking.date.and_time(booking.range.start());
        let end = booking.date.and_time(booking.range.end());
        lines.push("BEGIN:VEVENT".to_owned());
        lines.push(format!("UID:{}@{}", booking.id, settings.host));
        lines.push(format!("DTSTAMP:{dtstamp}"));
        lines.push(format!("DTSTART:{}", start.format("%Y%m%dT%H%M%S")));
        lines.push(format!("DTEND:{}", end.format("%Y%m%dT%H%M%S")));
        lines.push(format!("SUMMARY:{}", escape_text(&booking.title)));
        if let Some(description) = booking.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(format!("DESCRIPTION:{}", escape_text(description)));
        }
        lines.push("STATUS:CONFIRMED".to_owned());
        lines.push("TRANSP:OPAQUE".to_owned());
        lines.push("END:VEVENT".to_owned());
    }
    lines.push("END:VCALENDAR".to_owned());

    let mut out = String::new();
    for line in &lines {
        fold_line(line, &mut out);
    }
    out
}
