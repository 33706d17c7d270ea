//! Prompt text for the two model calls we make.

use std::fmt::Write as _;

use crate::store::models::Interaction;

pub const RISK_SYSTEM_PROMPT: &str = r#"You are a mental health risk assessment AI. Analyze the user's message and return ONLY a JSON object with:
{
    "risk_score": float between 0.0-1.0,
    "risk_level": "low" | "medium" | "high",
    "reasoning": "brief explanation",
    "intent": "craving" | "trigger" | "gratitude" | "logistics" | "support_needed" | "crisis"
}

Risk indicators:
- High (0.8+): Suicidal ideation, self-harm, immediate relapse risk, hopelessness
- Medium (0.5-0.8): Strong cravings, recent triggers, isolation, relationship issues
- Low (0.0-0.5): Check-ins, gratitude, seeking resources, general conversation

Consider context: recovery journey, addiction support, mental health."#;

pub const REPLY_SYSTEM_PROMPT: &str = r#"You are ARC, an AI Recovery Companion specializing in addiction recovery and mental health support.

Your approach:
- Use motivational interviewing techniques (open questions, affirmations, reflective listening)
- Be warm, empathetic, and non-judgmental
- Keep responses brief (1-2 sentences) and actionable
- Always include one concrete coping strategy or next step
- Never provide medical advice
- Affirm the user's strength and progress

Response guidelines by risk level:
- LOW: Supportive, encouraging, maintain momentum
- MEDIUM: More active listening, offer specific coping tools
- HIGH: Immediate grounding techniques, offer human support

If user expresses gratitude: Reflect it back and build on their strength.
If user reports craving: Validate feeling, offer immediate coping strategy.
If user shares trigger: Help them process and plan for next time.

Always end with either:
- A coping technique they can try right now
- A reflection question to deepen insight
- An offer to connect with human support

Respond in a conversational, supportive tone. No clinical jargon."#;

/// Number of prior turns quoted in the reply prompt.
pub const REPLY_HISTORY_TURNS: usize = 3;
const HISTORY_PREVIEW_CHARS: usize = 100;

pub fn risk_user_prompt(text: &str, context: Option<&serde_json::Value>) -> String {
    let mut out = format!("User message: \"{text}\"\n");
    if let Some(ctx) = context {
        let _ = write!(out, "\nUser context: {ctx}\n");
    }
    out
}

pub struct ReplyContext<'a> {
    pub alias: &'a str,
    pub risk_level: &'a str,
    pub intent: &'a str,
    /// Newest first, as the store returns them.
    pub recent: &'a [Interaction],
    /// `(id, category, title)` of resources the model may recommend.
    pub resources: &'a [(String, String, String)],
}

pub fn reply_user_prompt(message: &str, ctx: &ReplyContext<'_>) -> String {
    let mut context = format!(
        "User alias: {}\nCurrent risk level: {}\nMessage intent: {}",
        ctx.alias, ctx.risk_level, ctx.intent
    );

    if !ctx.recent.is_empty() {
        let turns = ctx
            .recent
            .iter()
            .take(REPLY_HISTORY_TURNS)
            .rev()
            .map(|i| {
                let text: String = i.text.chars().take(HISTORY_PREVIEW_CHARS).collect();
                format!("{}: {}", i.direction.as_str(), text)
            })
            .collect::<Vec<_>>()
            .join("; ");
        let _ = write!(context, "\nRecent conversation: {turns}");
    }

    if !ctx.resources.is_empty() {
        let list = ctx
            .resources
            .iter()
            .map(|(id, cat, title)| format!("{id} ({cat}): {title}"))
            .collect::<Vec<_>>()
            .join("; ");
        let _ = write!(context, "\nAvailable coping resources: {list}");
    }

    format!(
        r#"Context: {context}

User's message: "{message}"

Provide a supportive response and suggest one specific coping resource if appropriate.
Return JSON format:
{{
    "response": "your empathetic response (1-2 sentences)",
    "coping_suggestion": "specific technique or resource" or null,
    "resource_id": "ID of recommended coping resource" or null
}}"#
    )
}
