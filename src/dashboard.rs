//! Descriptive aggregates over the stored requests.
//!
//! Every function here accepts an empty table and returns zeros or empty
//! series for it. Column positions come from [`DashboardColumns`]; a position
//! past the end of the schema simply yields nothing for that aggregate.

use crate::adapter::{ReadState, TableRead};
use crate::config::DashboardColumns;
use crate::dates;
use crate::table::{Table, present};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Rows in the trailing moving average window.
pub const MOVING_AVERAGE_WINDOW: usize = 7;

pub const NO_DATE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCount {
    pub room: String,
    pub building: String,
    pub zone: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub count: usize,
    pub moving_average: f64,
    pub cumulative: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DensityCell {
    pub weekday: String,
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Retention {
    pub one_time: usize,
    pub repeat: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub source: ReadState,
    /// Configured columns the sheet does not have.
    pub missing_columns: Vec<String>,
    pub total_requests: usize,
    pub unique_users: usize,
    pub busiest_date: String,
    pub by_requester: Vec<CountEntry>,
    pub by_topic: Vec<CountEntry>,
    pub by_team: Vec<CountEntry>,
    pub by_location: Vec<LocationCount>,
    pub daily: Vec<DailyPoint>,
    pub density: Vec<DensityCell>,
    pub retention: Retention,
}

/// Build the full report for one read.
pub fn report(read: &TableRead, columns: &DashboardColumns) -> DashboardReport {
    let table = &read.table;
    let stamps = timestamps(table, columns.date);

    DashboardReport {
        source: read.state(),
        missing_columns: missing_columns(table, columns),
        total_requests: table.len(),
        unique_users: unique_count(table, columns.requester),
        busiest_date: busiest_date(&stamps),
        by_requester: grouped_counts(table, columns.requester),
        by_topic: grouped_counts(table, columns.topic),
        by_team: grouped_counts(table, columns.team),
        by_location: location_counts(table, columns.room, columns.building, columns.zone),
        daily: daily_series(&stamps),
        density: weekday_hour_density(&stamps),
        retention: retention(table, columns.requester),
    }
}

fn missing_columns(table: &Table, columns: &DashboardColumns) -> Vec<String> {
    let width = table.schema().len();
    if width == 0 {
        return Vec::new();
    }
    [
        ("requester", columns.requester),
        ("team", columns.team),
        ("topic", columns.topic),
        ("room", columns.room),
        ("building", columns.building),
        ("zone", columns.zone),
        ("date", columns.date),
    ]
    .into_iter()
    .filter(|(_, index)| *index >= width)
    .map(|(name, _)| name.to_string())
    .collect()
}

fn present_values(table: &Table, index: usize) -> Vec<&str> {
    table
        .column(index)
        .map(|column| column.filter_map(present).collect())
        .unwrap_or_default()
}

fn occurrences(table: &Table, index: usize) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for value in present_values(table, index) {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

pub fn unique_count(table: &Table, index: usize) -> usize {
    occurrences(table, index).len()
}

/// Rows per value, most frequent first, ties by label.
pub fn grouped_counts(table: &Table, index: usize) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = occurrences(table, index)
        .into_iter()
        .map(|(label, count)| CountEntry {
            label: label.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries
}

/// Rows per room × building × zone. Rows missing any part are skipped.
pub fn location_counts(table: &Table, room: usize, building: usize, zone: usize) -> Vec<LocationCount> {
    let mut counts: HashMap<(&str, &str, &str), usize> = HashMap::new();
    for row in table.rows() {
        let part = |i: usize| row.get(i).and_then(present);
        if let (Some(r), Some(b), Some(z)) = (part(room), part(building), part(zone)) {
            *counts.entry((r, b, z)).or_insert(0) += 1;
        }
    }

    let mut entries: Vec<LocationCount> = counts
        .into_iter()
        .map(|((r, b, z), count)| LocationCount {
            room: r.to_string(),
            building: b.to_string(),
            zone: z.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| (&a.room, &a.building, &a.zone).cmp(&(&b.room, &b.building, &b.zone)))
    });
    entries
}

/// Parsed timestamps of the date column. Unparseable cells are dropped.
pub fn timestamps(table: &Table, index: usize) -> Vec<NaiveDateTime> {
    present_values(table, index)
        .into_iter()
        .filter_map(dates::parse_cell)
        .collect()
}

/// The day with the most requests, earliest on ties, or `"N/A"`.
pub fn busiest_date(stamps: &[NaiveDateTime]) -> String {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for ts in stamps {
        *per_day.entry(ts.date()).or_insert(0) += 1;
    }

    let mut best: Option<(NaiveDate, usize)> = None;
    for (day, count) in per_day {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((day, count));
        }
    }
    best.map(|(day, _)| day.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NO_DATE.to_string())
}

/// Requests per day in date order with a trailing moving average over the
/// last [`MOVING_AVERAGE_WINDOW`] points (fewer at the start) and a running
/// total.
pub fn daily_series(stamps: &[NaiveDateTime]) -> Vec<DailyPoint> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for ts in stamps {
        *per_day.entry(ts.date()).or_insert(0) += 1;
    }

    let counts: Vec<(NaiveDate, usize)> = per_day.into_iter().collect();
    let mut cumulative = 0;
    counts
        .iter()
        .enumerate()
        .map(|(i, &(date, count))| {
            cumulative += count;
            let start = (i + 1).saturating_sub(MOVING_AVERAGE_WINDOW);
            let window = &counts[start..=i];
            let sum: usize = window.iter().map(|(_, c)| c).sum();
            DailyPoint {
                date,
                count,
                moving_average: sum as f64 / window.len() as f64,
                cumulative,
            }
        })
        .collect()
}

/// Requests per weekday and hour, Monday first.
pub fn weekday_hour_density(stamps: &[NaiveDateTime]) -> Vec<DensityCell> {
    let mut cells: BTreeMap<(u32, u32), (String, usize)> = BTreeMap::new();
    for ts in stamps {
        let weekday = ts.weekday();
        let entry = cells
            .entry((weekday.num_days_from_monday(), ts.hour()))
            .or_insert_with(|| (weekday.to_string(), 0));
        entry.1 += 1;
    }
    cells
        .into_iter()
        .map(|((_, hour), (weekday, count))| DensityCell { weekday, hour, count })
        .collect()
}

/// Requesters seen exactly once vs more than once.
pub fn retention(table: &Table, requester: usize) -> Retention {
    occurrences(table, requester)
        .values()
        .fold(Retention::default(), |mut acc, &n| {
            if n == 1 {
                acc.one_time += 1;
            } else {
                acc.repeat += 1;
            }
            acc
        })
}
