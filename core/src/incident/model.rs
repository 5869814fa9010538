use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One transcript line after markup stripping and name resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedEntry {
    pub author_name: String,
    /// `YYYY-MM-DD HH:MM:SS` in the configured offset.
    pub timestamp_display: String,
    pub text: String,
}

impl NormalizedEntry {
    pub fn date(&self) -> &str {
        self.timestamp_display
            .get(..10)
            .unwrap_or(&self.timestamp_display)
    }

    /// `[timestamp] author: text`, the form used in prompts.
    pub fn transcript_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp_display, self.author_name, self.text
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineItem {
    pub timestamp_display: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

/// Canonical report record. Every field has a usable default so a report can
/// always be rendered, whatever the model left out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentReport {
    pub title: String,
    pub incident_date: String,
    pub generated_at: String,
    /// Person who drove the resolution.
    pub author: String,
    pub priority: Priority,
    pub status: String,
    pub category: String,
    pub environment: String,
    /// Comma-separated systems or services hit by the incident.
    pub affected_resources: String,
    /// Short description shown alongside the metadata.
    pub description: String,
    pub summary: String,
    pub timeline: Vec<TimelineItem>,
    pub impact: Vec<String>,
    pub root_cause: String,
    pub remediation: Vec<String>,
    pub went_well: Vec<String>,
    pub went_wrong: Vec<String>,
    pub tags: BTreeSet<String>,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub html: String,
    pub markdown: String,
}
