//! TwiML documents returned from the messaging and voice webhooks.

use anyhow::Result;
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub const VOICE: &str = "alice";

/// Served when a document fails to render.
pub const FALLBACK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say voice="alice">I'm sorry, I'm having technical difficulties. Please call back or text us for support. If this is an emergency, please hang up and dial 911.</Say><Hangup/></Response>"#;

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    Message(String),
    Say(String),
    Pause(u32),
    Gather(Gather),
    Hangup,
    Stream(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gather {
    pub input: &'static str,
    pub timeout: u32,
    pub speech_timeout: &'static str,
    pub action: Option<String>,
    pub prompts: Vec<String>,
}

impl Gather {
    /// Speech or keypad, with the caller's end of speech detected automatically.
    pub fn speech_or_digits(timeout: u32) -> Self {
        Self {
            input: "speech dtmf",
            timeout,
            speech_timeout: "auto",
            action: None,
            prompts: Vec::new(),
        }
    }

    pub fn action(mut self, url: impl Into<String>) -> Self {
        self.action = Some(url.into());
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.prompts.push(text.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagingResponse {
    verbs: Vec<Verb>,
}

impl MessagingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Message(text.into()));
        self
    }

    pub fn render(&self) -> Result<String> {
        render(&self.verbs)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn pause(mut self, secs: u32) -> Self {
        self.verbs.push(Verb::Pause(secs));
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// `<Start><Stream url=…/></Start>`: fork call audio to a media socket.
    pub fn start_stream(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Stream(url.into()));
        self
    }

    pub fn render(&self) -> Result<String> {
        render(&self.verbs)
    }
}

fn render(verbs: &[Verb]) -> Result<String> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    if verbs.is_empty() {
        w.write_event(Event::Empty(BytesStart::new("Response")))?;
    } else {
        w.write_event(Event::Start(BytesStart::new("Response")))?;
        for v in verbs {
            write_verb(&mut w, v)?;
        }
        w.write_event(Event::End(BytesEnd::new("Response")))?;
    }
    Ok(String::from_utf8(w.into_inner())?)
}

/// Element with text content. Only `<`, `>` and `&` are escaped so spoken
/// apostrophes stay readable.
fn write_text(w: &mut Writer<Vec<u8>>, start: BytesStart<'_>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(start))?;
    w.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn say(w: &mut Writer<Vec<u8>>, text: &str) -> Result<()> {
    let start = BytesStart::new("Say").with_attributes([("voice", VOICE)]);
    write_text(w, start, "Say", text)
}

fn write_verb(w: &mut Writer<Vec<u8>>, verb: &Verb) -> Result<()> {
    match verb {
        Verb::Message(text) => write_text(w, BytesStart::new("Message"), "Message", text)?,
        Verb::Say(text) => say(w, text)?,
        Verb::Pause(secs) => {
            let len = secs.to_string();
            w.write_event(Event::Empty(
                BytesStart::new("Pause").with_attributes([("length", len.as_str())]),
            ))?;
        }
        Verb::Hangup => w.write_event(Event::Empty(BytesStart::new("Hangup")))?,
        Verb::Stream(url) => {
            w.write_event(Event::Start(BytesStart::new("Start")))?;
            w.write_event(Event::Empty(
                BytesStart::new("Stream").with_attributes([("url", url.as_str())]),
            ))?;
            w.write_event(Event::End(BytesEnd::new("Start")))?;
        }
        Verb::Gather(g) => {
            let timeout = g.timeout.to_string();
            let mut start = BytesStart::new("Gather").with_attributes([
                ("input", g.input),
                ("timeout", timeout.as_str()),
                ("speechTimeout", g.speech_timeout),
            ]);
            if let Some(action) = &g.action {
                start.push_attribute(("action", action.as_str()));
                start.push_attribute(("method", "POST"));
            }
            if g.prompts.is_empty() {
                w.write_event(Event::Empty(start))?;
            } else {
                w.write_event(Event::Start(start))?;
                for p in &g.prompts {
                    say(w, p)?;
                }
                w.write_event(Event::End(BytesEnd::new("Gather")))?;
            }
        }
    }
    Ok(())
}

/// `application/xml` response; a render failure degrades to [`FALLBACK_XML`].
pub fn xml_response(doc: Result<String>) -> Response {
    let body = doc.unwrap_or_else(|e| {
        tracing::error!(error = %e, "twiml_render_failed");
        FALLBACK_XML.to_string()
    });
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

// ------------------------------------------------------------
// Canned documents
// ------------------------------------------------------------

pub fn message(text: &str) -> Result<String> {
    MessagingResponse::new().message(text).render()
}

pub fn empty() -> Result<String> {
    MessagingResponse::new().render()
}

/// Greeting for an inbound call, then the media stream and a listening gather.
pub fn inbound_greeting(stream_url: &str, gather_action: &str) -> Result<String> {
    VoiceResponse::new()
        .say(
            "Hello, you've reached ARC, your AI Recovery Companion. \
             I'm here to listen and support you. Please speak freely.",
        )
        .start_stream(stream_url)
        .gather(Gather::speech_or_digits(10).action(gather_action))
        .pause(60)
        .render()
}

/// Proactive call placed to a user flagged at risk.
pub fn crisis_call(alias: &str, gather_action: &str) -> Result<String> {
    VoiceResponse::new()
        .say(format!(
            "Hello {alias}, this is ARC calling to check on you. \
             I noticed you might be going through a difficult time right now. \
             I'm here to listen and support you. Please stay on the line, and let's talk."
        ))
        .pause(2)
        .say(
            "If you'd prefer to speak with a human mentor, press 1. \
             Otherwise, please tell me how you're feeling right now.",
        )
        .gather(
            Gather::speech_or_digits(10)
                .action(gather_action)
                .say("I'm listening..."),
        )
        .say(
            "I want you to know that you're not alone. \
             Our support team is here for you 24/7. \
             Please call us back anytime you need support.",
        )
        .render()
}

/// Spoken answer to a caller's speech, then another chance to talk.
pub fn gather_reply(reply: &str, gather_action: &str) -> Result<String> {
    VoiceResponse::new()
        .say(reply)
        .pause(2)
        .say(
            "Is there anything else you'd like to talk about? \
             Press 1 to speak with a human mentor, or keep talking with me.",
        )
        .gather(
            Gather::speech_or_digits(15)
                .action(gather_action)
                .say("I'm here to listen..."),
        )
        .say(
            "Thank you for sharing with me today. \
             Remember, you can call or text us anytime you need support. \
             Take care of yourself.",
        )
        .hangup()
        .render()
}

pub fn human_transfer() -> Result<String> {
    VoiceResponse::new()
        .say(
            "I'm connecting you with a human mentor right now. \
             Please hold while I transfer your call.",
        )
        .pause(3)
        .say("A mentor will be with you shortly. Thank you for reaching out.")
        .render()
}

/// The caller asked for a mentor but no routing task could be created.
pub fn transfer_unavailable() -> Result<String> {
    VoiceResponse::new()
        .say(
            "I'm sorry, I couldn't reach a mentor right now. \
             If this is an emergency, please hang up and dial 911, or call 988 \
             to reach the crisis line. You can call us back anytime.",
        )
        .hangup()
        .render()
}

pub fn unknown_caller() -> Result<String> {
    VoiceResponse::new()
        .say(
            "Thank you for calling. Our support team will be in touch. \
             Take care of yourself.",
        )
        .hangup()
        .render()
}

pub fn no_input() -> Result<String> {
    VoiceResponse::new()
        .say(
            "I didn't hear anything, but that's okay. \
             Sometimes it's hard to find words. \
             You can call us back anytime you're ready to talk. You're not alone.",
        )
        .hangup()
        .render()
}

pub fn call_error() -> Result<String> {
    VoiceResponse::new()
        .say(
            "I'm sorry, I'm experiencing technical difficulties right now. \
             Please try calling back in a few minutes, or text us for immediate support. \
             If this is an emergency, please hang up and dial 911.",
        )
        .hangup()
        .render()
}

pub fn hangup() -> Result<String> {
    VoiceResponse::new().hangup().render()
}
