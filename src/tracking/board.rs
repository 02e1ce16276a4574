//! Dashboard tallies and filters for the case and visit lists.

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;

use crate::models::{CaseSnapshot, CaseStatus, VisitRow, VisitStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaseBoard {
    pub created: usize,
    pub in_process: usize,
    pub finished: usize,
    pub closed: usize,
}

impl CaseBoard {
    pub fn from_cases(cases: &[CaseSnapshot]) -> Self {
        cases.iter().fold(Self::default(), |mut board, case| {
            match case.status {
                CaseStatus::Created => board.created += 1,
                CaseStatus::InProcess => board.in_process += 1,
                CaseStatus::Finished => board.finished += 1,
                CaseStatus::Closed => board.closed += 1,
            }
            board
        })
    }

    pub fn total(&self) -> usize {
        self.created + self.in_process + self.finished + self.closed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VisitBoard {
    pub assigned: usize,
    pub confirmed: usize,
    pub in_progress: usize,
    pub finished: usize,
    /// Not finished and scheduled before today. Overlaps the other counts.
    pub overdue: usize,
}

impl VisitBoard {
    pub fn from_rows(rows: &[VisitRow], today: NaiveDate, offset: FixedOffset) -> Self {
        rows.iter().fold(Self::default(), |mut board, row| {
            match row.status {
                VisitStatus::Assigned => board.assigned += 1,
                VisitStatus::Confirmed => board.confirmed += 1,
                VisitStatus::InProgress => board.in_progress += 1,
                VisitStatus::Finished => board.finished += 1,
            }
            if is_overdue(row, today, offset) {
                board.overdue += 1;
            }
            board
        })
    }
}

/// Compared by calendar day in the display offset, so a visit scheduled for
/// earlier today is not overdue.
pub fn is_overdue(row: &VisitRow, today: NaiveDate, offset: FixedOffset) -> bool {
    if row.status == VisitStatus::Finished {
        return false;
    }
    match row.scheduled_at {
        Some(at) => at.with_timezone(&offset).date_naive() < today,
        None => false,
    }
}

// ── Filters ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFilter {
    All,
    Status(VisitStatus),
    Overdue,
}

fn contains_folded(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

pub fn filter_visits<'a>(
    rows: &'a [VisitRow],
    filter: VisitFilter,
    query: &str,
    today: NaiveDate,
    offset: FixedOffset,
) -> Vec<&'a VisitRow> {
    let needle = query.trim().to_lowercase();
    rows.iter()
        .filter(|row| match filter {
            VisitFilter::All => true,
            VisitFilter::Status(status) => row.status == status,
            VisitFilter::Overdue => is_overdue(row, today, offset),
        })
        .filter(|row| {
            needle.is_empty()
                || row.visit_id.to_string().contains(&needle)
                || contains_folded(row.assignee_name.as_deref(), &needle)
                || contains_folded(row.store_name.as_deref(), &needle)
        })
        .collect()
}

pub fn filter_cases<'a>(
    cases: &'a [CaseSnapshot],
    status: Option<CaseStatus>,
    query: &str,
) -> Vec<&'a CaseSnapshot> {
    let needle = query.trim().to_lowercase();
    cases
        .iter()
        .filter(|case| status.map_or(true, |s| s == case.status))
        .filter(|case| {
            needle.is_empty()
                || contains_folded(case.store_name.as_deref(), &needle)
                || case
                    .correlative_number
                    .is_some_and(|n| n.to_string().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn guatemala() -> FixedOffset {
        FixedOffset::west_opt(6 * 3600).unwrap()
    }

    fn row(id: i64, status: VisitStatus, scheduled: Option<(u32, u32)>) -> VisitRow {
        VisitRow {
            visit_id: id,
            case_id: None,
            status,
            scheduled_at: scheduled.map(|(d, h)| Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()),
            store_name: Some(format!("Tienda {id}")),
            assignee_name: Some("Ana López".into()),
        }
    }

    fn case(id: &str, status: CaseStatus, store: &str, correlative: i64) -> CaseSnapshot {
        CaseSnapshot {
            case_id: id.into(),
            correlative_number: Some(correlative),
            status,
            created_at: None,
            updated_at: None,
            store_name: Some(store.into()),
            message: None,
            closing_message: None,
            division: Some(1),
        }
    }

    #[test]
    fn case_tallies() {
        let cases = vec![
            case("a", CaseStatus::Created, "Zona 10", 1),
            case("b", CaseStatus::Created, "Zona 1", 2),
            case("c", CaseStatus::InProcess, "Mixco", 3),
            case("d", CaseStatus::Closed, "Villa Nueva", 4),
        ];
        let board = CaseBoard::from_cases(&cases);
        assert_eq!(
            board,
            CaseBoard {
                created: 2,
                in_process: 1,
                finished: 0,
                closed: 1
            }
        );
        assert_eq!(board.total(), 4);
    }

    #[test]
    fn overdue_by_local_calendar_day() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let rows = vec![
            row(1, VisitStatus::Assigned, Some((9, 12))),
            // 2024-01-10 03:00 UTC is still 2024-01-09 in Guatemala.
            row(2, VisitStatus::Confirmed, Some((10, 3))),
            row(3, VisitStatus::Assigned, Some((10, 12))),
            row(4, VisitStatus::Finished, Some((1, 12))),
            row(5, VisitStatus::InProgress, None),
        ];
        let board = VisitBoard::from_rows(&rows, today, guatemala());
        assert_eq!(board.assigned, 2);
        assert_eq!(board.confirmed, 1);
        assert_eq!(board.in_progress, 1);
        assert_eq!(board.finished, 1);
        assert_eq!(board.overdue, 2);
    }

    #[test]
    fn visit_filters_and_search() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let rows = vec![
            row(11, VisitStatus::Assigned, Some((2, 12))),
            row(12, VisitStatus::Finished, Some((2, 12))),
            row(13, VisitStatus::Assigned, Some((12, 12))),
        ];

        let overdue = filter_visits(&rows, VisitFilter::Overdue, "", today, guatemala());
        assert_eq!(overdue.iter().map(|r| r.visit_id).collect::<Vec<_>>(), vec![11]);

        let assigned = filter_visits(
            &rows,
            VisitFilter::Status(VisitStatus::Assigned),
            "tienda 13",
            today,
            guatemala(),
        );
        assert_eq!(assigned.iter().map(|r| r.visit_id).collect::<Vec<_>>(), vec![13]);

        let by_name = filter_visits(&rows, VisitFilter::All, "LÓPEZ", today, guatemala());
        assert_eq!(by_name.len(), 3);
    }

    #[test]
    fn case_filters_and_search() {
        let cases = vec![
            case("a", CaseStatus::Created, "Zona 10", 1040),
            case("b", CaseStatus::Closed, "Mixco", 1041),
        ];
        assert_eq!(filter_cases(&cases, None, "").len(), 2);
        assert_eq!(filter_cases(&cases, Some(CaseStatus::Closed), "").len(), 1);
        assert_eq!(filter_cases(&cases, None, "zona")[0].case_id, "a");
        assert_eq!(filter_cases(&cases, None, "1041")[0].case_id, "b");
    }
}
