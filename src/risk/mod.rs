//! Risk primitives shared by the classifier, the escalation table and the
//! persistence layer.

pub mod classifier;
pub mod escalation;
pub mod keywords;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use classifier::{ClassifyContext, RiskClassifier};
pub use escalation::{EscalationDecision, EscalationPolicy, EscalationReason};
pub use keywords::KeywordMatcher;

/// Score assigned when a crisis keyword matches; the model is skipped.
pub const KEYWORD_RISK_SCORE: f32 = 0.95;
/// Score assigned when the model is unavailable or answers garbage.
pub const FALLBACK_RISK_SCORE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Lenient parser for model output ("High", " medium ", ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" | "moderate" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two configured cut-offs. Always `0 <= medium <= high <= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub high: f32,
    pub medium: f32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.5,
        }
    }
}

impl RiskThresholds {
    /// Values are clamped to `[0, 1]`, NaN falls back to the default and an
    /// inverted pair is swapped.
    pub fn new(high: f32, medium: f32) -> Self {
        let defaults = Self::default();
        let unit = |v: f32, default: f32| if v.is_nan() { default } else { v.clamp(0.0, 1.0) };
        let mut high = unit(high, defaults.high);
        let mut medium = unit(medium, defaults.medium);
        if medium > high {
            std::mem::swap(&mut medium, &mut high);
        }
        Self { high, medium }
    }

    pub fn level_for(&self, score: f32) -> RiskLevel {
        if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// What the user is trying to do with the message, as labelled by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Craving,
    Trigger,
    Gratitude,
    Logistics,
    SupportNeeded,
    Crisis,
    VoiceSupport,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Craving => "craving",
            Intent::Trigger => "trigger",
            Intent::Gratitude => "gratitude",
            Intent::Logistics => "logistics",
            Intent::SupportNeeded => "support_needed",
            Intent::Crisis => "crisis",
            Intent::VoiceSupport => "voice_support",
            Intent::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "craving" => Intent::Craving,
            "trigger" => Intent::Trigger,
            "gratitude" => Intent::Gratitude,
            "logistics" => Intent::Logistics,
            "support_needed" => Intent::SupportNeeded,
            "crisis" => Intent::Crisis,
            "voice_support" => Intent::VoiceSupport,
            _ => Intent::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSource {
    Keyword,
    Model,
    Fallback,
}

impl RiskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskSource::Keyword => "keyword",
            RiskSource::Model => "model",
            RiskSource::Fallback => "fallback",
        }
    }
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub score: f32,
    pub level: RiskLevel,
    /// Crisis keywords found in the text, in configured order.
    pub keywords: Vec<String>,
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub source: RiskSource,
}

impl RiskAssessment {
    pub fn from_keywords(keywords: Vec<String>) -> Self {
        Self {
            score: KEYWORD_RISK_SCORE,
            level: RiskLevel::High,
            keywords,
            intent: Intent::Crisis,
            reasoning: None,
            source: RiskSource::Keyword,
        }
    }

    pub fn fallback() -> Self {
        Self {
            score: FALLBACK_RISK_SCORE,
            level: RiskLevel::Medium,
            keywords: Vec::new(),
            intent: Intent::Unknown,
            reasoning: None,
            source: RiskSource::Fallback,
        }
    }

    pub fn has_crisis_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }
}
