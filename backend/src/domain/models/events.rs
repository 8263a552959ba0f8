//! Event record models.
//!
//! Each of the six event types is its own struct with a validating
//! constructor, so a record can only ever hold the fields valid for its
//! variant. Every record belongs to exactly one child and is append-only:
//! this core creates event records but never updates or deletes them.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::DataError;

/// The six event categories, naming both the remote subcollections and the
/// cache slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Sleep,
    Feed,
    Diaper,
    Activity,
    Milestone,
    Weight,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Sleep,
        EventKind::Feed,
        EventKind::Diaper,
        EventKind::Activity,
        EventKind::Milestone,
        EventKind::Weight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Sleep => "sleep",
            EventKind::Feed => "feed",
            EventKind::Diaper => "diaper",
            EventKind::Activity => "activity",
            EventKind::Milestone => "milestone",
            EventKind::Weight => "weight",
        }
    }
}

/// Common surface of the six event record types.
///
/// `TIME_FIELDS` names the fields that are RFC 3339 strings in local JSON
/// but cross the remote-store boundary as native epoch-millis timestamps.
pub trait EventRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EventKind;
    const TIME_FIELDS: &'static [&'static str];

    fn child_id(&self) -> &str;

    /// The instant used for day bucketing and range filtering. Sleep uses
    /// its start; the window filter applies its own straddle rule.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// A sleep session with a quality rating from 1 (restless) to 5 (sound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepEvent {
    pub child_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub quality: u8,
}

impl SleepEvent {
    pub fn new(
        child_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        quality: u8,
    ) -> Result<Self, DataError> {
        if end <= start {
            return Err(DataError::Validation(
                "sleep end must be after start".to_string(),
            ));
        }
        if !(1..=5).contains(&quality) {
            return Err(DataError::Validation(format!(
                "sleep quality must be between 1 and 5, got {}",
                quality
            )));
        }
        Ok(Self {
            child_id: child_id.to_string(),
            start,
            end,
            quality,
        })
    }
}

impl EventRecord for SleepEvent {
    const KIND: EventKind = EventKind::Sleep;
    const TIME_FIELDS: &'static [&'static str] = &["start", "end"];

    fn child_id(&self) -> &str {
        &self.child_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NursingSide {
    Left,
    Right,
}

/// How a feeding was given. The variant carries exactly the fields that
/// apply: a side for nursing, an amount for bottle and solid feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMethod {
    Nursing { side: NursingSide },
    Bottle { amount_oz: f64 },
    Solid { amount: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub child_id: String,
    pub date_time: DateTime<Utc>,
    pub method: FeedMethod,
    pub duration_minutes: f64,
    pub notes: Option<String>,
}

impl FeedEvent {
    pub fn new(
        child_id: &str,
        date_time: DateTime<Utc>,
        method: FeedMethod,
        duration_minutes: f64,
        notes: Option<String>,
    ) -> Result<Self, DataError> {
        if duration_minutes <= 0.0 {
            return Err(DataError::Validation(
                "feed duration must be positive".to_string(),
            ));
        }
        match method {
            FeedMethod::Bottle { amount_oz } if amount_oz <= 0.0 => {
                return Err(DataError::Validation(
                    "bottle amount must be positive".to_string(),
                ));
            }
            FeedMethod::Solid { amount } if amount <= 0.0 => {
                return Err(DataError::Validation(
                    "solid amount must be positive".to_string(),
                ));
            }
            _ => {}
        }
        Ok(Self {
            child_id: child_id.to_string(),
            date_time,
            method,
            duration_minutes,
            notes,
        })
    }
}

impl EventRecord for FeedEvent {
    const KIND: EventKind = EventKind::Feed;
    const TIME_FIELDS: &'static [&'static str] = &["date_time"];

    fn child_id(&self) -> &str {
        &self.child_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.date_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiaperAmount {
    Little,
    Medium,
    Lots,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PooColor {
    Yellow,
    Brown,
    Green,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PooConsistency {
    Runny,
    Soft,
    Solid,
}

/// What a diaper contained. Each variant carries only its own detail
/// fields, so a dry diaper cannot accidentally hold a poo color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiaperContents {
    Pee {
        amount: DiaperAmount,
    },
    Poo {
        amount: DiaperAmount,
        color: PooColor,
        consistency: PooConsistency,
    },
    Mixed {
        pee_amount: DiaperAmount,
        poo_amount: DiaperAmount,
        color: PooColor,
        consistency: PooConsistency,
    },
    Dry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaperEvent {
    pub child_id: String,
    pub date_time: DateTime<Utc>,
    pub contents: DiaperContents,
    pub rash: bool,
}

impl DiaperEvent {
    pub fn new(
        child_id: &str,
        date_time: DateTime<Utc>,
        contents: DiaperContents,
        rash: bool,
    ) -> Self {
        Self {
            child_id: child_id.to_string(),
            date_time,
            contents,
            rash,
        }
    }
}

impl EventRecord for DiaperEvent {
    const KIND: EventKind = EventKind::Diaper;
    const TIME_FIELDS: &'static [&'static str] = &["date_time"];

    fn child_id(&self) -> &str {
        &self.child_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.date_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TummyTime,
    Bath,
    Walk,
    Play,
    Reading,
    Outing,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::TummyTime => "Tummy time",
            ActivityKind::Bath => "Bath",
            ActivityKind::Walk => "Walk",
            ActivityKind::Play => "Play",
            ActivityKind::Reading => "Reading",
            ActivityKind::Outing => "Outing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub child_id: String,
    pub date_time: DateTime<Utc>,
    pub kind: ActivityKind,
}

impl ActivityEvent {
    pub fn new(child_id: &str, date_time: DateTime<Utc>, kind: ActivityKind) -> Self {
        Self {
            child_id: child_id.to_string(),
            date_time,
            kind,
        }
    }
}

impl EventRecord for ActivityEvent {
    const KIND: EventKind = EventKind::Activity;
    const TIME_FIELDS: &'static [&'static str] = &["date_time"];

    fn child_id(&self) -> &str {
        &self.child_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.date_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    Smile,
    Rollover,
    Sit,
    Crawl,
    Stand,
    FirstWord,
    FirstStep,
    Tooth,
}

impl MilestoneKind {
    pub fn label(&self) -> &'static str {
        match self {
            MilestoneKind::Smile => "First smile",
            MilestoneKind::Rollover => "Rolled over",
            MilestoneKind::Sit => "Sat up",
            MilestoneKind::Crawl => "Crawled",
            MilestoneKind::Stand => "Stood up",
            MilestoneKind::FirstWord => "First word",
            MilestoneKind::FirstStep => "First step",
            MilestoneKind::Tooth => "First tooth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEvent {
    pub child_id: String,
    pub date_time: DateTime<Utc>,
    pub kind: MilestoneKind,
}

impl MilestoneEvent {
    pub fn new(child_id: &str, date_time: DateTime<Utc>, kind: MilestoneKind) -> Self {
        Self {
            child_id: child_id.to_string(),
            date_time,
            kind,
        }
    }
}

impl EventRecord for MilestoneEvent {
    const KIND: EventKind = EventKind::Milestone;
    const TIME_FIELDS: &'static [&'static str] = &["date_time"];

    fn child_id(&self) -> &str {
        &self.child_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.date_time
    }
}

/// A weight measurement in pounds and ounces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEvent {
    pub child_id: String,
    pub date_time: DateTime<Utc>,
    pub pounds: u32,
    pub ounces: u32,
}

impl WeightEvent {
    pub fn new(
        child_id: &str,
        date_time: DateTime<Utc>,
        pounds: u32,
        ounces: u32,
    ) -> Result<Self, DataError> {
        if ounces >= 16 {
            return Err(DataError::Validation(format!(
                "ounces must be less than 16, got {}",
                ounces
            )));
        }
        if pounds == 0 && ounces == 0 {
            return Err(DataError::Validation(
                "weight must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            child_id: child_id.to_string(),
            date_time,
            pounds,
            ounces,
        })
    }

    /// Normalized weight in ounces for comparison and axis math.
    pub fn total_ounces(&self) -> u32 {
        self.pounds * 16 + self.ounces
    }
}

impl EventRecord for WeightEvent {
    const KIND: EventKind = EventKind::Weight;
    const TIME_FIELDS: &'static [&'static str] = &["date_time"];

    fn child_id(&self) -> &str {
        &self.child_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.date_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_sleep_requires_end_after_start() {
        assert!(SleepEvent::new("c1", at(9), at(10), 3).is_ok());
        assert!(SleepEvent::new("c1", at(10), at(10), 3).is_err());
        assert!(SleepEvent::new("c1", at(10), at(9), 3).is_err());
    }

    #[test]
    fn test_sleep_quality_range() {
        assert!(SleepEvent::new("c1", at(9), at(10), 1).is_ok());
        assert!(SleepEvent::new("c1", at(9), at(10), 5).is_ok());
        assert!(SleepEvent::new("c1", at(9), at(10), 0).is_err());
        assert!(SleepEvent::new("c1", at(9), at(10), 6).is_err());
    }

    #[test]
    fn test_feed_validation() {
        let nursing = FeedMethod::Nursing {
            side: NursingSide::Left,
        };
        assert!(FeedEvent::new("c1", at(9), nursing.clone(), 15.0, None).is_ok());
        assert!(FeedEvent::new("c1", at(9), nursing, 0.0, None).is_err());

        assert!(FeedEvent::new("c1", at(9), FeedMethod::Bottle { amount_oz: 4.0 }, 10.0, None).is_ok());
        assert!(FeedEvent::new("c1", at(9), FeedMethod::Bottle { amount_oz: 0.0 }, 10.0, None).is_err());
        assert!(FeedEvent::new("c1", at(9), FeedMethod::Solid { amount: -1.0 }, 10.0, None).is_err());
    }

    #[test]
    fn test_weight_validation() {
        // Explicit zero weight is rejected
        assert!(WeightEvent::new("c1", at(9), 0, 0).is_err());
        // Either component may be zero on its own
        assert!(WeightEvent::new("c1", at(9), 5, 0).is_ok());
        assert!(WeightEvent::new("c1", at(9), 0, 4).is_ok());
        // Ounces must stay below a pound
        assert!(WeightEvent::new("c1", at(9), 5, 16).is_err());
    }

    #[test]
    fn test_weight_total_ounces() {
        let weight = WeightEvent::new("c1", at(9), 7, 9).unwrap();
        assert_eq!(weight.total_ounces(), 121);
    }

    #[test]
    fn test_feed_method_serialization_is_tagged() {
        let method = FeedMethod::Nursing {
            side: NursingSide::Right,
        };
        let json = serde_json::to_value(&method).unwrap();
        assert_eq!(json["type"], "nursing");
        assert_eq!(json["side"], "right");
    }
}
