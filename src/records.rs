//! Meeting records as the application stores them. Field names follow the
//! application's JSON (camelCase).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub job_title: String,
    #[serde(default)]
    pub skills: Option<String>,
    #[serde(default)]
    pub strengths: Option<String>,
    #[serde(default)]
    pub weaknesses: Option<String>,
    #[serde(default)]
    pub growth_plan: Option<String>,
}

impl Member {
    pub fn new(id: i64, name: impl Into<String>, job_title: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            job_title: job_title.into(),
            skills: None,
            strengths: None,
            weaknesses: None,
            growth_plan: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneOnOne {
    pub id: i64,
    pub member_id: i64,
    pub date: NaiveDate,
    pub content: String,
    #[serde(default)]
    pub next_actions: Option<String>,
    #[serde(default)]
    pub ai_summary: Option<String>,
}

impl OneOnOne {
    pub fn new(id: i64, member_id: i64, date: NaiveDate, content: impl Into<String>) -> Self {
        Self {
            id,
            member_id,
            date,
            content: content.into(),
            next_actions: None,
            ai_summary: None,
        }
    }

    pub fn with_next_actions(mut self, next_actions: impl Into<String>) -> Self {
        self.next_actions = Some(next_actions.into());
        self
    }

    /// Next actions, if any were written down.
    pub fn next_actions(&self) -> Option<&str> {
        self.next_actions
            .as_deref()
            .map(str::trim)
            .filter(|actions| !actions.is_empty())
    }
}

/// A session together with the member it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    pub session: OneOnOne,
    pub member: Member,
}

impl SessionRecord {
    pub fn new(session: OneOnOne, member: Member) -> Self {
        Self { session, member }
    }
}

/// Inclusive date bounds; a missing end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}
