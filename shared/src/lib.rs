use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of entries a density-limited day stack renders.
/// The underlying data is never truncated - only the visual stack is capped.
pub const MAX_VISIBLE_STACK_ENTRIES: usize = 5;

/// One point on the weight trend chart.
///
/// A point is either a real measurement taken that day or the most recent
/// prior measurement carried forward to keep the line continuous. Days
/// before the first real measurement produce no point at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightChartPoint {
    pub date: NaiveDate,
    pub pounds: u32,
    pub ounces: u32,
    /// Normalized weight (`pounds * 16 + ounces`) used for comparison,
    /// sorting, and axis generation.
    pub total_ounces: u32,
    /// True when this point repeats the previous day's value rather than
    /// representing a measurement taken on `date`.
    pub is_carried_over: bool,
}

/// Rendering style for a weight axis gridline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum AxisLineStyle {
    /// Whole-pound gridline.
    Solid,
    /// Half-pound (8 oz) gridline drawn between whole-pound lines.
    Dashed,
}

/// A horizontal gridline on the weight chart's vertical axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightAxisTick {
    pub total_ounces: u32,
    pub style: AxisLineStyle,
}

/// Per-day sleep rollup for the sleep chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SleepDaySummary {
    pub date: NaiveDate,
    /// Minutes of sleep overlapping this calendar day.
    pub total_minutes: i64,
    /// Number of sessions that touch this day.
    pub session_count: usize,
}

/// Sleep duration broken into display units.
///
/// Computed by integer division on millisecond deltas, so a 90-minute
/// session reads as 1 hour 30 minutes with no rounding artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SleepDurationDisplay {
    pub hours: i64,
    pub minutes: i64,
}

/// Per-day feeding rollup for list headers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedDaySummary {
    pub date: NaiveDate,
    pub feed_count: usize,
    pub nursing_count: usize,
    pub bottle_count: usize,
    pub solid_count: usize,
    /// Sum of bottle amounts for the day, in ounces.
    pub total_bottle_ounces: f64,
}

/// Per-day diaper rollup for list headers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiaperDaySummary {
    pub date: NaiveDate,
    pub pee_count: usize,
    pub poo_count: usize,
    pub mixed_count: usize,
    pub dry_count: usize,
    pub rash_count: usize,
}

/// One entry in a day's visual stack (milestones, activities).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayStackEntry {
    pub occurred_at: DateTime<Utc>,
    pub label: String,
}

/// All of a day's stackable entries, oldest first.
///
/// `entries` always holds the full day; renderers use [`DayStack::visible`]
/// and [`DayStack::overflow_count`] to cap density.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayStack {
    pub date: NaiveDate,
    pub entries: Vec<DayStackEntry>,
}

impl DayStack {
    /// The entries a density-limited stack actually renders.
    pub fn visible(&self) -> &[DayStackEntry] {
        let cap = self.entries.len().min(MAX_VISIBLE_STACK_ENTRIES);
        &self.entries[..cap]
    }

    /// How many entries are hidden behind the display cap.
    pub fn overflow_count(&self) -> usize {
        self.entries.len().saturating_sub(MAX_VISIBLE_STACK_ENTRIES)
    }
}
