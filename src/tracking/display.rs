//! Timestamp rendering as the dashboard shows it (es-GT).

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};

use super::stages::StageView;

pub const PENDING: &str = "Pendiente";

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

/// `dd/mm/yyyy HH:MM`, or an empty string when absent.
pub fn format_datetime(at: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    at.map(|t| t.with_timezone(&offset).format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_default()
}

/// `martes, 2 de enero de 2024, 02:00`
pub fn format_long(at: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    let month = MONTHS[local.month0() as usize];
    format!(
        "{}, {} de {} de {}, {}",
        weekday_name(local.weekday()),
        local.day(),
        month,
        local.year(),
        local.format("%H:%M")
    )
}

/// 08:00 local time on the day after `now`, for visits scheduled "mañana".
pub fn next_morning(now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let tomorrow = now.with_timezone(&offset).date_naive().succ_opt()?;
    let local = tomorrow.and_time(NaiveTime::from_hms_opt(8, 0, 0)?);
    Some(local.and_local_timezone(offset).single()?.with_timezone(&Utc))
}

/// Timestamp for a stepper stage, or "Pendiente" when incomplete.
pub fn stage_timestamp(view: &StageView, offset: FixedOffset) -> String {
    match (view.complete, view.timestamp) {
        (true, Some(at)) => format_datetime(Some(at), offset),
        (true, None) => String::new(),
        (false, _) => PENDING.to_string(),
    }
}
