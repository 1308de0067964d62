//! Memory categories.
//!
//! Remembered facts are filed under one of three durable categories;
//! `NotApplicable` marks input that should not be stored at all.

use serde::{Deserialize, Serialize};

/// Category of a remembered fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    /// Stable facts about the user (name, occupation, location)
    Profile,
    /// Likes, dislikes, and standing choices
    Preference,
    /// Situational facts about ongoing work or plans
    Context,
    /// Not worth remembering
    NotApplicable,
}

impl MemoryCategory {
    /// String form used in storage and categorization output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Preference => "preference",
            Self::Context => "context",
            Self::NotApplicable => "not_applicable",
        }
    }

    /// Lenient parse of categorization output. Unknown labels map to
    /// `NotApplicable` so a confused classifier never stores garbage.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "profile" => Self::Profile,
            "preference" => Self::Preference,
            "context" => Self::Context,
            _ => Self::NotApplicable,
        }
    }

    /// Whether facts of this category are stored.
    #[must_use]
    pub fn is_storable(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
