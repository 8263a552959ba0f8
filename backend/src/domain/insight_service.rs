//! Insight generation.
//!
//! Assembles a scoped, privacy-filtered summary of the selected categories
//! and day-range, sends it to the text-generation endpoint, and manages the
//! request lifecycle. Cancellation is a distinct terminal state, not an
//! error; upstream failures collapse into one fixed user-facing message
//! rather than a structured error.

use chrono::Local;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::aggregation::{filter_by_range, filter_sleep_by_range, sleep_duration_display};
use crate::domain::event_service::AllData;
use crate::domain::models::child::Child;
use crate::domain::models::events::{EventKind, FeedMethod};
use crate::errors::InsightError;

/// Shown in place of an insight when the endpoint fails.
pub const INSIGHT_FALLBACK_MESSAGE: &str =
    "We couldn't generate an insight right now. Please try again in a little while.";

const SYSTEM_PROMPT: &str = "You are a warm, knowledgeable infant-care assistant. \
You will receive a JSON summary of a child's recent care events. Write a short, \
encouraging narrative for the caregiver highlighting notable patterns in the data. \
Do not give medical advice; suggest consulting a pediatrician for any concern. \
Respond in plain prose with no markdown.";

/// Endpoint configuration for the generation call.
#[derive(Debug, Clone)]
pub struct InsightConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

/// Terminal state of one insight request.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightOutcome {
    /// The endpoint produced a narrative.
    Generated(String),
    /// The endpoint failed; surface the fixed fallback message.
    Failed,
    /// The caller cancelled; surface nothing.
    Cancelled,
}

impl InsightOutcome {
    /// Text to show the user, or `None` after a cancellation.
    pub fn message(&self) -> Option<&str> {
        match self {
            InsightOutcome::Generated(text) => Some(text),
            InsightOutcome::Failed => Some(INSIGHT_FALLBACK_MESSAGE),
            InsightOutcome::Cancelled => None,
        }
    }
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// The child block sent upstream. Deliberately excludes the internal
/// child identifier.
#[derive(Debug, Serialize)]
struct ChildBlock {
    name: String,
    relationship: String,
    birthdate: String,
    sex: String,
    age: String,
}

#[derive(Debug, Serialize)]
struct SleepBlock {
    start: String,
    end: String,
    quality: u8,
    duration: String,
}

#[derive(Debug, Serialize)]
struct FeedBlock {
    time: String,
    method: FeedMethod,
    duration_minutes: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiaperBlock {
    time: String,
    contents: crate::domain::models::events::DiaperContents,
    rash: bool,
}

#[derive(Debug, Serialize)]
struct MomentBlock {
    time: String,
    label: String,
}

#[derive(Debug, Serialize)]
struct WeightBlock {
    time: String,
    pounds: u32,
    ounces: u32,
}

/// The serialized summary sent as the user message. Unselected categories
/// and selected-but-empty categories are omitted entirely.
#[derive(Debug, Serialize)]
pub struct InsightSummary {
    child: ChildBlock,
    range_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sleep: Option<Vec<SleepBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feed: Option<Vec<FeedBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diaper: Option<Vec<DiaperBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    activity: Option<Vec<MomentBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone: Option<Vec<MomentBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<Vec<WeightBlock>>,
}

/// Service issuing cancellable insight-generation requests.
#[derive(Clone)]
pub struct InsightService {
    http: reqwest::Client,
    config: InsightConfig,
}

impl InsightService {
    pub fn new(config: InsightConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Build the scoped summary for the selected categories and range.
    ///
    /// Each fresh call starts from the current selection only, so a
    /// category selected in an earlier run can never leak into this one.
    pub fn build_summary(
        child: &Child,
        selected: &[EventKind],
        range_days: u32,
        data: &AllData,
    ) -> InsightSummary {
        let today = Local::now().date_naive();
        let mut summary = InsightSummary {
            child: ChildBlock {
                name: child.full_name(),
                relationship: format!("{:?}", child.relationship),
                birthdate: child.birthdate.to_string(),
                sex: format!("{:?}", child.sex),
                age: child.age_description(today),
            },
            range_days,
            sleep: None,
            feed: None,
            diaper: None,
            activity: None,
            milestone: None,
            weight: None,
        };

        for kind in selected {
            match kind {
                EventKind::Sleep => {
                    let sessions = filter_sleep_by_range(&data.sleep, range_days);
                    if !sessions.is_empty() {
                        summary.sleep = Some(
                            sessions
                                .iter()
                                .map(|session| {
                                    let duration = sleep_duration_display(session);
                                    SleepBlock {
                                        start: session.start.to_rfc3339(),
                                        end: session.end.to_rfc3339(),
                                        quality: session.quality,
                                        duration: format!(
                                            "{}h {}m",
                                            duration.hours, duration.minutes
                                        ),
                                    }
                                })
                                .collect(),
                        );
                    }
                }
                EventKind::Feed => {
                    let feeds = filter_by_range(&data.feeds, range_days);
                    if !feeds.is_empty() {
                        summary.feed = Some(
                            feeds
                                .into_iter()
                                .map(|feed| FeedBlock {
                                    time: feed.date_time.to_rfc3339(),
                                    method: feed.method,
                                    duration_minutes: feed.duration_minutes,
                                    notes: feed.notes,
                                })
                                .collect(),
                        );
                    }
                }
                EventKind::Diaper => {
                    let diapers = filter_by_range(&data.diapers, range_days);
                    if !diapers.is_empty() {
                        summary.diaper = Some(
                            diapers
                                .into_iter()
                                .map(|diaper| DiaperBlock {
                                    time: diaper.date_time.to_rfc3339(),
                                    contents: diaper.contents,
                                    rash: diaper.rash,
                                })
                                .collect(),
                        );
                    }
                }
                EventKind::Activity => {
                    let activities = filter_by_range(&data.activities, range_days);
                    if !activities.is_empty() {
                        summary.activity = Some(
                            activities
                                .iter()
                                .map(|activity| MomentBlock {
                                    time: activity.date_time.to_rfc3339(),
                                    label: activity.kind.label().to_string(),
                                })
                                .collect(),
                        );
                    }
                }
                EventKind::Milestone => {
                    let milestones = filter_by_range(&data.milestones, range_days);
                    if !milestones.is_empty() {
                        summary.milestone = Some(
                            milestones
                                .iter()
                                .map(|milestone| MomentBlock {
                                    time: milestone.date_time.to_rfc3339(),
                                    label: milestone.kind.label().to_string(),
                                })
                                .collect(),
                        );
                    }
                }
                EventKind::Weight => {
                    let weights = filter_by_range(&data.weights, range_days);
                    if !weights.is_empty() {
                        summary.weight = Some(
                            weights
                                .iter()
                                .map(|weight| WeightBlock {
                                    time: weight.date_time.to_rfc3339(),
                                    pounds: weight.pounds,
                                    ounces: weight.ounces,
                                })
                                .collect(),
                        );
                    }
                }
            }
        }
        summary
    }

    /// Generate an insight for the selection, honoring `token`.
    ///
    /// Cancelling aborts the in-flight network call and resolves to
    /// [`InsightOutcome::Cancelled`]; it never surfaces as an error.
    pub async fn generate(
        &self,
        child: &Child,
        selected: &[EventKind],
        range_days: u32,
        data: &AllData,
        token: &CancellationToken,
    ) -> InsightOutcome {
        let summary = Self::build_summary(child, selected, range_days, data);
        let user_content = match serde_json::to_string(&summary) {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to serialize insight summary: {}", err);
                return InsightOutcome::Failed;
            }
        };
        debug!(
            "Requesting insight over {} categories, {} day range",
            selected.len(),
            range_days
        );

        tokio::select! {
            _ = token.cancelled() => {
                info!("Insight request cancelled by caller");
                InsightOutcome::Cancelled
            }
            result = self.post_chat(&user_content) => match result {
                Ok(text) => InsightOutcome::Generated(strip_think_block(&text)),
                Err(err) => {
                    warn!("Insight generation failed: {}", err);
                    InsightOutcome::Failed
                }
            }
        }
    }

    async fn post_chat(&self, user_content: &str) -> Result<String, InsightError> {
        let body = ChatRequestBody {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::Status(status));
        }

        let parsed: ChatResponseBody = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(InsightError::MalformedBody)
    }
}

/// Remove a `<think>...</think>` reasoning block from generated text.
pub fn strip_think_block(text: &str) -> String {
    if let (Some(open), Some(close)) = (text.find("<think>"), text.find("</think>")) {
        if open <= close {
            let mut cleaned = String::with_capacity(text.len());
            cleaned.push_str(&text[..open]);
            cleaned.push_str(&text[close + "</think>".len()..]);
            return cleaned.trim().to_string();
        }
    }
    text.trim().to_string()
}
