//! Escalation decision table. First matching row wins:
//!
//! | # | condition                              | reason                     |
//! |---|----------------------------------------|----------------------------|
//! | 1 | crisis keywords present                | `crisis_keywords_detected` |
//! | 2 | score >= high threshold                | `high_risk_score`          |
//! | 3 | text asks for a human                  | `explicit_human_request`   |
//! | 4 | otherwise                              | `no_escalation_needed`     |

use serde::{Deserialize, Serialize};

use super::{KeywordMatcher, RiskAssessment, RiskThresholds};

pub const PRIORITY_CRISIS: u8 = 10;
pub const PRIORITY_STANDARD: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    CrisisKeywordsDetected,
    HighRiskScore,
    ExplicitHumanRequest,
    NoEscalationNeeded,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::CrisisKeywordsDetected => "crisis_keywords_detected",
            EscalationReason::HighRiskScore => "high_risk_score",
            EscalationReason::ExplicitHumanRequest => "explicit_human_request",
            EscalationReason::NoEscalationNeeded => "no_escalation_needed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EscalationDecision {
    pub escalate: bool,
    pub reason: EscalationReason,
}

pub struct EscalationPolicy {
    thresholds: RiskThresholds,
    help_phrases: KeywordMatcher,
}

impl EscalationPolicy {
    pub fn new(thresholds: RiskThresholds, help_phrases: KeywordMatcher) -> Self {
        Self {
            thresholds,
            help_phrases,
        }
    }

    pub fn decide(&self, assessment: &RiskAssessment, text: &str) -> EscalationDecision {
        let reason = if assessment.has_crisis_keywords() {
            EscalationReason::CrisisKeywordsDetected
        } else if assessment.score >= self.thresholds.high {
            EscalationReason::HighRiskScore
        } else if self.help_phrases.matches_any(text) {
            EscalationReason::ExplicitHumanRequest
        } else {
            EscalationReason::NoEscalationNeeded
        };
        EscalationDecision {
            escalate: reason != EscalationReason::NoEscalationNeeded,
            reason,
        }
    }
}

/// Routing priority for an automatic escalation.
pub fn escalation_priority(assessment: &RiskAssessment) -> u8 {
    if assessment.has_crisis_keywords() {
        PRIORITY_CRISIS
    } else {
        PRIORITY_STANDARD
    }
}
