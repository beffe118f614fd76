//! Scripted page sessions for `xray replay`.
//!
//! One step per line:
//!
//! ```text
//! # comment
//! open https://www.netflix.com/watch/80057281
//! title Band of BrothersE7The Breaking Point
//! clear
//! ```

use thiserror::Error;
use xray_detect::{MutationBatch, PageHost, ScriptedPage, TitleObserver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Navigate to a new location.
    Open(String),
    /// Replace the title element's text.
    Title(String),
    /// Remove the title element.
    Clear,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("line {line}: unknown step {word:?}")]
    UnknownStep { line: usize, word: String },
    #[error("line {line}: `{word}` needs an argument")]
    MissingArgument { line: usize, word: &'static str },
}

pub fn parse_script(input: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (trimmed, ""),
        };
        let step = match word {
            "open" if rest.is_empty() => {
                return Err(ScriptError::MissingArgument { line, word: "open" })
            }
            "open" => Step::Open(rest.to_string()),
            "title" if rest.is_empty() => {
                return Err(ScriptError::MissingArgument { line, word: "title" })
            }
            "title" => Step::Title(rest.to_string()),
            "clear" => Step::Clear,
            other => {
                return Err(ScriptError::UnknownStep {
                    line,
                    word: other.to_string(),
                })
            }
        };
        steps.push(step);
    }
    Ok(steps)
}

/// Apply each step to the page, then deliver one mutation batch for it.
pub fn play(observer: &mut TitleObserver<ScriptedPage>, steps: &[Step]) {
    for step in steps {
        let page = observer.host_mut();
        match step {
            Step::Open(href) => page.navigate(href.as_str()),
            Step::Title(text) => page.set_title(Some(text.as_str())),
            Step::Clear => page.set_title(None),
        }
        tracing::debug!(?step, href = %observer.host().location_href(), "replay step");
        observer.handle_mutations(&MutationBatch::single());
    }
}
