//! Time-window aggregation for trend views and reports.
//!
//! This module turns flat event lists plus a day-count into either filtered
//! lists for list views or per-day buckets for charts. All bucketing is by
//! local calendar date, not UTC. The UI should only handle presentation
//! concerns; the range math, carry-forward rules, and axis generation all
//! live here.
//!
//! Functions taking an explicit reference date/time carry an `_at` suffix;
//! the plain variants evaluate against the local clock.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use log::debug;
use shared::{
    AxisLineStyle, DayStack, DayStackEntry, DiaperDaySummary, FeedDaySummary, SleepDaySummary,
    SleepDurationDisplay, WeightAxisTick, WeightChartPoint,
};

use crate::domain::models::events::{
    ActivityEvent, DiaperContents, DiaperEvent, EventRecord, FeedEvent, FeedMethod,
    MilestoneEvent, SleepEvent, WeightEvent,
};

/// One calendar day's worth of records within a requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket<T> {
    pub date: NaiveDate,
    pub records: Vec<T>,
}

/// Local calendar date an instant falls on.
fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

/// First instant of the requested window: local midnight of
/// `today - range_days + 1`.
fn window_start(range_days: u32, now: DateTime<Local>) -> DateTime<Local> {
    let start_date = now.date_naive() - Duration::days(range_days as i64 - 1);
    Local
        .from_local_datetime(&start_date.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap_or(now)
}

/// Keep records whose timestamp falls within the last `range_days` local
/// calendar days, ending now.
pub fn filter_by_range<T: EventRecord>(records: &[T], range_days: u32) -> Vec<T> {
    filter_by_range_at(records, range_days, Local::now())
}

pub fn filter_by_range_at<T: EventRecord>(
    records: &[T],
    range_days: u32,
    now: DateTime<Local>,
) -> Vec<T> {
    let start = window_start(range_days, now);
    let mut filtered: Vec<T> = records
        .iter()
        .filter(|record| {
            let at = record.occurred_at().with_timezone(&Local);
            at >= start && at <= now
        })
        .cloned()
        .collect();
    filtered.sort_by_key(|record| record.occurred_at());
    filtered
}

/// Range filter for sleep sessions. A session is included when *either* its
/// start or its end falls in the window, so a night straddling the window
/// boundary still shows up.
pub fn filter_sleep_by_range(records: &[SleepEvent], range_days: u32) -> Vec<SleepEvent> {
    filter_sleep_by_range_at(records, range_days, Local::now())
}

pub fn filter_sleep_by_range_at(
    records: &[SleepEvent],
    range_days: u32,
    now: DateTime<Local>,
) -> Vec<SleepEvent> {
    let start = window_start(range_days, now);
    let in_window = |instant: DateTime<Utc>| {
        let at = instant.with_timezone(&Local);
        at >= start && at <= now
    };
    let mut filtered: Vec<SleepEvent> = records
        .iter()
        .filter(|session| in_window(session.start) || in_window(session.end))
        .cloned()
        .collect();
    filtered.sort_by_key(|session| session.start);
    filtered
}

/// Build exactly `range_days` buckets keyed by local calendar date, oldest
/// first and chronologically contiguous, ending on `today`. Days with no
/// records get an empty bucket rather than a gap.
pub fn bucket_by_day<T: EventRecord>(records: &[T], range_days: u32) -> Vec<DayBucket<T>> {
    bucket_by_day_at(records, range_days, Local::now().date_naive())
}

pub fn bucket_by_day_at<T: EventRecord>(
    records: &[T],
    range_days: u32,
    today: NaiveDate,
) -> Vec<DayBucket<T>> {
    let first = today - Duration::days(range_days as i64 - 1);
    let mut buckets: Vec<DayBucket<T>> = (0..range_days)
        .map(|offset| DayBucket {
            date: first + Duration::days(offset as i64),
            records: Vec::new(),
        })
        .collect();

    for record in records {
        let date = local_date(record.occurred_at());
        if date < first || date > today {
            continue;
        }
        let index = (date - first).num_days() as usize;
        buckets[index].records.push(record.clone());
    }
    for bucket in &mut buckets {
        bucket.records.sort_by_key(|record| record.occurred_at());
    }

    debug!(
        "Bucketed {} records into {} days ending {}",
        records.len(),
        range_days,
        today
    );
    buckets
}

/// Weight trend series with carry-forward.
///
/// Walking buckets oldest to newest: a day with measurements contributes
/// its chronologically last sample; a day without measurements repeats the
/// most recent prior sample flagged as carried over. Days before the first
/// real sample produce no point - the series never fabricates a
/// pre-history value.
pub fn weight_series(weights: &[WeightEvent], range_days: u32) -> Vec<WeightChartPoint> {
    weight_series_at(weights, range_days, Local::now().date_naive())
}

pub fn weight_series_at(
    weights: &[WeightEvent],
    range_days: u32,
    today: NaiveDate,
) -> Vec<WeightChartPoint> {
    let buckets = bucket_by_day_at(weights, range_days, today);
    let mut points = Vec::new();
    let mut last_known: Option<(u32, u32)> = None;

    for bucket in &buckets {
        match bucket.records.last() {
            Some(sample) => {
                last_known = Some((sample.pounds, sample.ounces));
                points.push(WeightChartPoint {
                    date: bucket.date,
                    pounds: sample.pounds,
                    ounces: sample.ounces,
                    total_ounces: sample.total_ounces(),
                    is_carried_over: false,
                });
            }
            None => {
                if let Some((pounds, ounces)) = last_known {
                    points.push(WeightChartPoint {
                        date: bucket.date,
                        pounds,
                        ounces,
                        total_ounces: pounds * 16 + ounces,
                        is_carried_over: true,
                    });
                }
            }
        }
    }
    points
}

/// Axis gridlines for a weight series: one solid line per whole pound
/// covering the series, with a dashed half-pound line strictly between each
/// adjacent pair of whole-pound lines.
pub fn weight_axis_ticks(points: &[WeightChartPoint]) -> Vec<WeightAxisTick> {
    let (min, max) = match points.iter().map(|point| point.total_ounces).fold(
        None,
        |acc: Option<(u32, u32)>, ounces| match acc {
            None => Some((ounces, ounces)),
            Some((min, max)) => Some((min.min(ounces), max.max(ounces))),
        },
    ) {
        Some(bounds) => bounds,
        None => return Vec::new(),
    };

    let first_pound = min / 16;
    let last_pound = max.div_ceil(16);
    let mut ticks = Vec::new();
    for pound in first_pound..=last_pound {
        ticks.push(WeightAxisTick {
            total_ounces: pound * 16,
            style: AxisLineStyle::Solid,
        });
        if pound < last_pound {
            ticks.push(WeightAxisTick {
                total_ounces: pound * 16 + 8,
                style: AxisLineStyle::Dashed,
            });
        }
    }
    ticks
}

/// Sleep duration as integer hours plus remainder minutes, computed by
/// integer division on the millisecond delta.
pub fn sleep_duration_display(session: &SleepEvent) -> SleepDurationDisplay {
    let delta_ms = session
        .end
        .signed_duration_since(session.start)
        .num_milliseconds();
    let total_minutes = delta_ms / 60_000;
    SleepDurationDisplay {
        hours: total_minutes / 60,
        minutes: total_minutes % 60,
    }
}

/// Per-day sleep rollups. A session's minutes are attributed to each day by
/// overlap, so an overnight session splits across both calendar days.
pub fn sleep_day_summaries(sessions: &[SleepEvent], range_days: u32) -> Vec<SleepDaySummary> {
    sleep_day_summaries_at(sessions, range_days, Local::now().date_naive())
}

pub fn sleep_day_summaries_at(
    sessions: &[SleepEvent],
    range_days: u32,
    today: NaiveDate,
) -> Vec<SleepDaySummary> {
    let first = today - Duration::days(range_days as i64 - 1);
    (0..range_days)
        .map(|offset| {
            let date = first + Duration::days(offset as i64);
            let day_start = Local
                .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
                .single()
                .map(|start| start.with_timezone(&Utc));
            let Some(day_start) = day_start else {
                return SleepDaySummary {
                    date,
                    total_minutes: 0,
                    session_count: 0,
                };
            };
            let day_end = day_start + Duration::days(1);

            let mut total_minutes = 0;
            let mut session_count = 0;
            for session in sessions {
                let overlap_start = session.start.max(day_start);
                let overlap_end = session.end.min(day_end);
                if overlap_end > overlap_start {
                    total_minutes +=
                        (overlap_end - overlap_start).num_milliseconds() / 60_000;
                    session_count += 1;
                }
            }
            SleepDaySummary {
                date,
                total_minutes,
                session_count,
            }
        })
        .collect()
}

/// Per-day feeding rollups for list headers.
pub fn feed_day_summaries(feeds: &[FeedEvent], range_days: u32) -> Vec<FeedDaySummary> {
    feed_day_summaries_at(feeds, range_days, Local::now().date_naive())
}

pub fn feed_day_summaries_at(
    feeds: &[FeedEvent],
    range_days: u32,
    today: NaiveDate,
) -> Vec<FeedDaySummary> {
    bucket_by_day_at(feeds, range_days, today)
        .into_iter()
        .map(|bucket| {
            let mut summary = FeedDaySummary {
                date: bucket.date,
                feed_count: bucket.records.len(),
                nursing_count: 0,
                bottle_count: 0,
                solid_count: 0,
                total_bottle_ounces: 0.0,
            };
            for feed in &bucket.records {
                match feed.method {
                    FeedMethod::Nursing { .. } => summary.nursing_count += 1,
                    FeedMethod::Bottle { amount_oz } => {
                        summary.bottle_count += 1;
                        summary.total_bottle_ounces += amount_oz;
                    }
                    FeedMethod::Solid { .. } => summary.solid_count += 1,
                }
            }
            summary
        })
        .collect()
}

/// Per-day diaper rollups for list headers.
pub fn diaper_day_summaries(diapers: &[DiaperEvent], range_days: u32) -> Vec<DiaperDaySummary> {
    diaper_day_summaries_at(diapers, range_days, Local::now().date_naive())
}

pub fn diaper_day_summaries_at(
    diapers: &[DiaperEvent],
    range_days: u32,
    today: NaiveDate,
) -> Vec<DiaperDaySummary> {
    bucket_by_day_at(diapers, range_days, today)
        .into_iter()
        .map(|bucket| {
            let mut summary = DiaperDaySummary {
                date: bucket.date,
                pee_count: 0,
                poo_count: 0,
                mixed_count: 0,
                dry_count: 0,
                rash_count: 0,
            };
            for diaper in &bucket.records {
                match diaper.contents {
                    DiaperContents::Pee { .. } => summary.pee_count += 1,
                    DiaperContents::Poo { .. } => summary.poo_count += 1,
                    DiaperContents::Mixed { .. } => summary.mixed_count += 1,
                    DiaperContents::Dry => summary.dry_count += 1,
                }
                if diaper.rash {
                    summary.rash_count += 1;
                }
            }
            summary
        })
        .collect()
}

/// Day stacks for the activity chart. Every same-day record is retained,
/// tagged with its original timestamp; the display cap lives in the DTO.
pub fn activity_stacks(activities: &[ActivityEvent], range_days: u32) -> Vec<DayStack> {
    activity_stacks_at(activities, range_days, Local::now().date_naive())
}

pub fn activity_stacks_at(
    activities: &[ActivityEvent],
    range_days: u32,
    today: NaiveDate,
) -> Vec<DayStack> {
    bucket_by_day_at(activities, range_days, today)
        .into_iter()
        .map(|bucket| DayStack {
            date: bucket.date,
            entries: bucket
                .records
                .iter()
                .map(|activity| DayStackEntry {
                    occurred_at: activity.date_time,
                    label: activity.kind.label().to_string(),
                })
                .collect(),
        })
        .collect()
}

/// Day stacks for the milestone chart.
pub fn milestone_stacks(milestones: &[MilestoneEvent], range_days: u32) -> Vec<DayStack> {
    milestone_stacks_at(milestones, range_days, Local::now().date_naive())
}

pub fn milestone_stacks_at(
    milestones: &[MilestoneEvent],
    range_days: u32,
    today: NaiveDate,
) -> Vec<DayStack> {
    bucket_by_day_at(milestones, range_days, today)
        .into_iter()
        .map(|bucket| DayStack {
            date: bucket.date,
            entries: bucket
                .records
                .iter()
                .map(|milestone| DayStackEntry {
                    occurred_at: milestone.date_time,
                    label: milestone.kind.label().to_string(),
                })
                .collect(),
        })
        .collect()
}
