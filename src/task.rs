use crate::error::TodoError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Urgency of a task. Persisted as its integer value (1-3).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn symbol(self) -> &'static str {
        match self {
            Priority::Low => "↓",
            Priority::Medium => "→",
            Priority::High => "↑",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p as u8
    }
}

impl TryFrom<u8> for Priority {
    type Error = TodoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            other => Err(TodoError::InvalidInput(format!(
                "priority must be 1, 2 or 3 (got {})",
                other
            ))),
        }
    }
}

impl FromStr for Priority {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "low" => Ok(Priority::Low),
            "2" | "medium" => Ok(Priority::Medium),
            "3" | "high" => Ok(Priority::High),
            _ => Err(TodoError::InvalidInput(format!(
                "unknown priority '{}' (use low, medium, high or 1-3)",
                s.trim()
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.symbol())
    }
}

/// A single to-do item. Only the store creates and mutates tasks, which keeps
/// `completed_at` set exactly when `completed` is true.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    id: u32,
    title: String,
    #[serde(default)]
    description: String,
    priority: Priority,
    completed: bool,
    #[serde(alias = "created_date", deserialize_with = "timestamp::deserialize")]
    created_at: DateTime<Local>,
    #[serde(
        alias = "completed_date",
        default,
        deserialize_with = "timestamp::deserialize_option"
    )]
    completed_at: Option<DateTime<Local>>,
}

impl Task {
    pub(crate) fn new(id: u32, title: String, description: String, priority: Priority) -> Self {
        Self {
            id,
            title,
            description,
            priority,
            completed: false,
            created_at: Local::now(),
            completed_at: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Local>> {
        self.completed_at
    }

    /// Marking an already completed task keeps its original completion time.
    pub(crate) fn mark_complete(&mut self) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(Local::now());
        }
    }

    pub(crate) fn mark_incomplete(&mut self) {
        self.completed = false;
        self.completed_at = None;
    }

    /// Checks the invariants a task read from disk must satisfy.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.id == 0 {
            return Err("task id 0 is not allowed".to_string());
        }
        if self.title.trim().is_empty() {
            return Err(format!("task {} has an empty title", self.id));
        }
        if self.completed != self.completed_at.is_some() {
            return Err(format!(
                "task {} has completed={} but completed_at is {}",
                self.id,
                self.completed,
                if self.completed_at.is_some() { "set" } else { "null" }
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.completed { "✓" } else { "○" };
        write!(f, "[{}] {} {}", status, self.priority.symbol(), self.title)
    }
}

/// Accepts RFC 3339 timestamps as well as offset-less ISO-8601 ones, which are
/// read as local time.
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{de::Error, Deserialize, Deserializer};

    fn parse<E: Error>(raw: &str) -> Result<DateTime<Local>, E> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Local));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| E::custom(format!("invalid timestamp '{}': {}", raw, e)))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| E::custom(format!("timestamp '{}' does not exist locally", raw)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Local>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => parse(&raw).map(Some),
            None => Ok(None),
        }
    }
}
