use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How the current user relates to a tracked child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    /// The user created this child record and may delete it.
    Owner,
    /// The user was granted access by the owner and may only remove
    /// their own access.
    Delegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

/// Domain model representing a tracked child.
///
/// Fields are immutable once created; the `relationship` tag is per-viewer
/// and assigned when the record is fetched, not stored with the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub relationship: Relationship,
    pub birthdate: NaiveDate,
    pub sex: Sex,
}

impl Child {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Human-readable age on `today`, in weeks under three months and in
    /// months thereafter. Used by the insight payload's child block.
    pub fn age_description(&self, today: NaiveDate) -> String {
        let days = (today - self.birthdate).num_days().max(0);
        let weeks = days / 7;
        let months = days / 30;
        if months < 3 {
            if weeks == 1 {
                "1 week old".to_string()
            } else {
                format!("{} weeks old", weeks)
            }
        } else if months < 24 {
            format!("{} months old", months)
        } else {
            format!("{} years old", days / 365)
        }
    }
}
