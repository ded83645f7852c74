use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::datetime::{short_month_name, sunday_on_or_before, weekday_index};
use crate::record::ActivityRecord;

pub const DAYS_PER_WEEK: usize = 7;

pub const DEFAULT_MAX_WEEKS: u32 = 52;
/// 12 px cell plus 3 px gap.
pub const DEFAULT_COLUMN_PX: u32 = 15;
pub const DEFAULT_LABEL_MIN_GAP_PX: u32 = 30;

/// Tuning knobs for the grid builder.
///
/// The pixel values feed only the month-label collision rule; the builder
/// itself renders nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    /// Upper bound on week columns (the rendered window).
    pub max_weeks: u32,
    /// Horizontal footprint of one week column.
    pub column_px: u32,
    /// Minimum pixel distance between two accepted month labels.
    pub label_min_gap_px: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_weeks: DEFAULT_MAX_WEEKS,
            column_px: DEFAULT_COLUMN_PX,
            label_min_gap_px: DEFAULT_LABEL_MIN_GAP_PX,
        }
    }
}

/// Misconfiguration is fatal to the call; there is no partial grid and no
/// retry. Malformed record data is normalized instead of rejected, so this
/// is the only error kind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("invalid grid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub count: u64,
    /// 0 = Sunday .. 6 = Saturday; always equals the cell's slot index.
    pub weekday: u8,
}

/// One calendar week, Sunday through Saturday. `None` slots pad the range
/// boundary and occur only in the first and last columns of a grid.
pub type WeekColumn = [Option<DayCell>; DAYS_PER_WEEK];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MonthLabel {
    pub week_index: usize,
    pub text: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivityGrid {
    /// Week columns in chronological order, oldest first.
    pub weeks: Vec<WeekColumn>,
    pub month_labels: Vec<MonthLabel>,
    /// Sum over all supplied records, including dates older than the
    /// rendered window. Callers use this to decide the empty state.
    pub total_count: u64,
}

/// Builds the contribution grid for `records`, ending on `today` inclusive.
///
/// Pure function of its inputs: no clock reads, no shared state, bounded at
/// `max_weeks * 7` iterations. Records may be unsorted and may repeat a
/// date; the later record wins.
#[tracing::instrument(skip(records, cfg), fields(records = records.len()))]
pub fn build(
    records: &[ActivityRecord],
    today: NaiveDate,
    cfg: &GridConfig,
) -> Result<ActivityGrid, GridError> {
    if cfg.max_weeks == 0 {
        return Err(GridError::InvalidArgument(
            "max_weeks must be positive".to_string(),
        ));
    }
    if cfg.column_px == 0 {
        return Err(GridError::InvalidArgument(
            "column_px must be positive".to_string(),
        ));
    }
    if cfg.label_min_gap_px == 0 {
        return Err(GridError::InvalidArgument(
            "label_min_gap_px must be positive".to_string(),
        ));
    }

    // Last write wins on duplicate dates; the feed is trusted, not rejected.
    let mut counts: HashMap<NaiveDate, u64> = HashMap::with_capacity(records.len());
    for record in records {
        counts.insert(record.date, record.count);
    }
    let total_count = counts
        .values()
        .fold(0u64, |acc, count| acc.saturating_add(*count));

    let range_start = aligned_range_start(today, cfg.max_weeks);

    let mut weeks: Vec<WeekColumn> = Vec::with_capacity(cfg.max_weeks as usize);
    let mut column: WeekColumn = [None; DAYS_PER_WEEK];
    let mut day = range_start;
    while day <= today {
        let slot = weekday_index(day) as usize;
        column[slot] = Some(DayCell {
            date: day,
            count: counts.get(&day).copied().unwrap_or(0),
            weekday: slot as u8,
        });
        if slot == DAYS_PER_WEEK - 1 {
            weeks.push(column);
            column = [None; DAYS_PER_WEEK];
        }
        day += Duration::days(1);
    }
    if column.iter().any(Option::is_some) {
        weeks.push(column);
    }

    let month_labels = place_month_labels(&weeks, cfg);

    debug!(
        weeks = weeks.len(),
        labels = month_labels.len(),
        total_count,
        "built activity grid"
    );

    Ok(ActivityGrid {
        weeks,
        month_labels,
        total_count,
    })
}

/// Sunday on/before `today - (max_weeks * 7 - 1)` days, nudged forward by
/// whole weeks when the backward alignment would overflow the column budget.
/// The most recent weeks win and the grid still ends on `today`.
fn aligned_range_start(today: NaiveDate, max_weeks: u32) -> NaiveDate {
    let span_days = i64::from(max_weeks) * 7 - 1;
    let mut start = sunday_on_or_before(today - Duration::days(span_days));
    let current_week = sunday_on_or_before(today);
    while (current_week - start).num_days() / 7 + 1 > i64::from(max_weeks) {
        start += Duration::days(7);
    }
    start
}

/// Scans columns left to right and proposes a label whenever the month of a
/// column's first real cell changes. A proposal is accepted only when its
/// pixel offset clears the last accepted label by the configured gap.
/// Suppressed transitions still advance the last-seen month, so a dropped
/// label is never retried at a later column.
fn place_month_labels(weeks: &[WeekColumn], cfg: &GridConfig) -> Vec<MonthLabel> {
    let mut labels = Vec::new();
    let mut last_seen_month: Option<u32> = None;
    let mut last_accepted_px: Option<u64> = None;

    for (week_index, column) in weeks.iter().enumerate() {
        let Some(first_cell) = column.iter().flatten().next() else {
            continue;
        };
        let month = first_cell.date.month();
        if last_seen_month == Some(month) {
            continue;
        }
        last_seen_month = Some(month);

        let offset_px = week_index as u64 * u64::from(cfg.column_px);
        let clears_gap = last_accepted_px
            .is_none_or(|prev| offset_px.saturating_sub(prev) >= u64::from(cfg.label_min_gap_px));
        if clears_gap {
            labels.push(MonthLabel {
                week_index,
                text: short_month_name(month),
            });
            last_accepted_px = Some(offset_px);
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::{ActivityGrid, DAYS_PER_WEEK, GridConfig, GridError, build};
    use crate::record::ActivityRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn last_cell_date(grid: &ActivityGrid) -> NaiveDate {
        grid.weeks
            .last()
            .and_then(|week| week.iter().flatten().next_back())
            .map(|cell| cell.date)
            .expect("grid has at least one cell")
    }

    #[test]
    fn empty_records_build_a_zero_grid() {
        let grid = build(&[], date(2025, 6, 15), &GridConfig::default()).expect("build");

        assert_eq!(grid.total_count, 0);
        assert!(grid.weeks.len() <= 52);
        assert!(
            grid.weeks
                .iter()
                .flat_map(|week| week.iter().flatten())
                .all(|cell| cell.count == 0)
        );
        assert_eq!(last_cell_date(&grid), date(2025, 6, 15));
    }

    #[test]
    fn column_count_never_exceeds_max_weeks() {
        // Sweep today across a whole week so every weekday alignment is hit.
        for offset in 0..7 {
            let today = date(2025, 6, 15) + chrono::Duration::days(offset);
            for max_weeks in [1, 4, 52, 53] {
                let cfg = GridConfig {
                    max_weeks,
                    ..GridConfig::default()
                };
                let grid = build(&[], today, &cfg).expect("build");
                assert!(
                    grid.weeks.len() <= max_weeks as usize,
                    "today={today} max_weeks={max_weeks} got {}",
                    grid.weeks.len()
                );
                assert_eq!(last_cell_date(&grid), today);
            }
        }
    }

    #[test]
    fn every_column_has_seven_slots_and_interior_columns_are_full() {
        let grid = build(&[], date(2025, 6, 18), &GridConfig::default()).expect("build");

        for week in &grid.weeks {
            assert_eq!(week.len(), DAYS_PER_WEEK);
        }
        for week in &grid.weeks[..grid.weeks.len() - 1] {
            assert!(week.iter().all(Option::is_some), "interior padding found");
        }
    }

    #[test]
    fn trailing_padding_matches_todays_weekday() {
        // 2025-06-18 is a Wednesday, slot 3.
        let grid = build(&[], date(2025, 6, 18), &GridConfig::default()).expect("build");

        let last = grid.weeks.last().expect("non-empty grid");
        for (slot, cell) in last.iter().enumerate() {
            if slot <= 3 {
                let cell = cell.expect("real day");
                assert_eq!(usize::from(cell.weekday), slot);
            } else {
                assert!(cell.is_none(), "slot {slot} should be padding");
            }
        }
        assert_eq!(last_cell_date(&grid), date(2025, 6, 18));
    }

    #[test]
    fn slot_index_always_equals_weekday() {
        let grid = build(&[], date(2025, 3, 5), &GridConfig::default()).expect("build");

        for week in &grid.weeks {
            for (slot, cell) in week.iter().enumerate() {
                if let Some(cell) = cell {
                    assert_eq!(usize::from(cell.weekday), slot);
                    assert_eq!(
                        u32::from(cell.weekday),
                        cell.date.weekday().num_days_from_sunday()
                    );
                }
            }
        }
    }

    #[test]
    fn counts_come_from_the_records() {
        let records = vec![ActivityRecord::new(date(2025, 6, 15), 3)];
        let cfg = GridConfig {
            max_weeks: 4,
            ..GridConfig::default()
        };
        let grid = build(&records, date(2025, 6, 15), &cfg).expect("build");

        assert_eq!(grid.total_count, 3);
        let last = grid
            .weeks
            .last()
            .and_then(|week| week.iter().flatten().next_back())
            .expect("today's cell");
        assert_eq!(last.date, date(2025, 6, 15));
        assert_eq!(last.count, 3);
    }

    #[test]
    fn later_duplicate_record_wins() {
        let records = vec![
            ActivityRecord::new(date(2025, 6, 10), 2),
            ActivityRecord::new(date(2025, 6, 10), 5),
        ];
        let grid = build(&records, date(2025, 6, 15), &GridConfig::default()).expect("build");

        let cell = grid
            .weeks
            .iter()
            .flat_map(|week| week.iter().flatten())
            .find(|cell| cell.date == date(2025, 6, 10))
            .expect("cell for 2025-06-10");
        assert_eq!(cell.count, 5);
        // Deduplicated before summing: the shadowed record does not count.
        assert_eq!(grid.total_count, 5);
    }

    #[test]
    fn records_outside_the_window_still_reach_total_count() {
        let records = vec![
            ActivityRecord::new(date(2024, 1, 10), 7),
            ActivityRecord::new(date(2025, 6, 1), 2),
        ];
        let grid = build(&records, date(2025, 6, 15), &GridConfig::default()).expect("build");

        assert_eq!(grid.total_count, 9);
        assert!(
            grid.weeks
                .iter()
                .flat_map(|week| week.iter().flatten())
                .all(|cell| cell.date != date(2024, 1, 10))
        );
    }

    #[test]
    fn builder_is_deterministic() {
        let records = vec![
            ActivityRecord::new(date(2025, 5, 1), 4),
            ActivityRecord::new(date(2025, 6, 2), 1),
        ];
        let first = build(&records, date(2025, 6, 15), &GridConfig::default()).expect("build");
        let second = build(&records, date(2025, 6, 15), &GridConfig::default()).expect("build");
        assert_eq!(first, second);
    }

    #[test]
    fn month_labels_honor_the_pixel_gap() {
        let cfg = GridConfig::default();
        let grid = build(&[], date(2025, 6, 15), &cfg).expect("build");

        assert!(!grid.month_labels.is_empty());
        for pair in grid.month_labels.windows(2) {
            let gap = (pair[1].week_index - pair[0].week_index) as u64 * u64::from(cfg.column_px);
            assert!(gap >= u64::from(cfg.label_min_gap_px));
        }
        let indices: Vec<usize> = grid.month_labels.iter().map(|l| l.week_index).collect();
        assert!(indices.windows(2).all(|pair| pair[0] < pair[1]), "labels out of order");
    }

    #[test]
    fn crowded_month_transition_is_suppressed_first_wins() {
        // Four columns: 2025-05-25 .. 2025-06-15. May is labeled at column 0;
        // the June transition lands one column later, inside the minimum gap,
        // and is dropped without being retried.
        let cfg = GridConfig {
            max_weeks: 4,
            ..GridConfig::default()
        };
        let grid = build(&[], date(2025, 6, 15), &cfg).expect("build");

        assert_eq!(grid.weeks.len(), 4);
        assert_eq!(grid.month_labels.len(), 1);
        assert_eq!(grid.month_labels[0].week_index, 0);
        assert_eq!(grid.month_labels[0].text, "May");
    }

    #[test]
    fn mid_week_month_boundary_anchors_on_the_column() {
        // 2025-07-01 is a Tuesday, so the column holding it opens on Sunday
        // 2025-06-29. The transition is keyed by each column's first cell,
        // so the Jul label lands on the next column, which opens on 07-06.
        let cfg = GridConfig {
            max_weeks: 8,
            ..GridConfig::default()
        };
        let grid = build(&[], date(2025, 7, 20), &cfg).expect("build");

        let jul = grid
            .month_labels
            .iter()
            .find(|label| label.text == "Jul")
            .expect("July label");
        let first = grid.weeks[jul.week_index]
            .iter()
            .flatten()
            .next()
            .expect("first cell");
        assert_eq!(first.date, date(2025, 7, 6));

        let straddling = &grid.weeks[jul.week_index - 1];
        assert!(
            straddling
                .iter()
                .flatten()
                .any(|cell| cell.date == date(2025, 7, 1))
        );
    }

    #[test]
    fn zero_arguments_fail_fast() {
        let mut cfg = GridConfig {
            max_weeks: 0,
            ..GridConfig::default()
        };
        assert_eq!(
            build(&[], date(2025, 6, 15), &cfg),
            Err(GridError::InvalidArgument(
                "max_weeks must be positive".to_string()
            ))
        );

        cfg = GridConfig {
            column_px: 0,
            ..GridConfig::default()
        };
        assert!(build(&[], date(2025, 6, 15), &cfg).is_err());

        cfg = GridConfig {
            label_min_gap_px: 0,
            ..GridConfig::default()
        };
        assert!(build(&[], date(2025, 6, 15), &cfg).is_err());
    }

    #[test]
    fn single_week_grid() {
        let cfg = GridConfig {
            max_weeks: 1,
            ..GridConfig::default()
        };
        // Wednesday: one column, Sunday..Wednesday real, rest padding.
        let grid = build(&[], date(2025, 6, 18), &cfg).expect("build");

        assert_eq!(grid.weeks.len(), 1);
        let real: Vec<_> = grid.weeks[0].iter().flatten().collect();
        assert_eq!(real.len(), 4);
        assert_eq!(real[0].date, date(2025, 6, 15));
        assert_eq!(last_cell_date(&grid), date(2025, 6, 18));
    }
}
