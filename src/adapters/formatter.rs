//! # Response Formatting
//!
//! Turns the model's Markdown reply into HTML for the browser client and,
//! when a synthesizer is configured, into spoken audio.
//!
//! ## HTML Conversion:
//! - CommonMark plus tables and strikethrough (pulldown-cmark)
//! - Raw HTML emitted by the model is escaped, not passed through, so a reply
//!   cannot inject markup into the page that embeds it

use crate::adapters::SpeechSynthesizer;
use crate::conversation::{ChatError, ChatResult};
use pulldown_cmark::{html, CowStr, Event, Options, Parser};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ResponseFormatter {
    speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl ResponseFormatter {
    pub fn new(speech: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { speech }
    }

    pub fn speech_enabled(&self) -> bool {
        self.speech.is_some()
    }

    pub fn speech_model(&self) -> Option<&str> {
        self.speech.as_deref().map(|s| s.model())
    }

    /// Convert Markdown to an HTML fragment. Pure and deterministic.
    pub fn to_html(&self, text: &str) -> String {
        markdown_to_html(text)
    }

    /// Synthesize `text` as MP3 audio.
    pub async fn to_speech(&self, text: &str) -> ChatResult<Vec<u8>> {
        match &self.speech {
            Some(speech) => speech.synthesize(text).await,
            None => Err(ChatError::Synthesis("speech synthesis is disabled".to_string())),
        }
    }
}

pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(CowStr::from(raw.into_string())),
        other => other,
    });

    let mut output = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output.trim_end().to_string()
}
