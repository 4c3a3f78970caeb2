//! Turn scripts: the ordered list of turns sent over one connection.
//!
//! A script is fixed at construction. The session walks it front to back and
//! only the last turn's output is ever published; earlier turns exist to warm
//! the connection up.

use serde::{Deserialize, Serialize};

/// Reading directive used when the caller supplies none.
pub const DEFAULT_READING_INSTRUCTIONS: &str =
    "Read the text aloud naturally, at a calm and even pace, without adding or omitting words.";

/// Filler text for the disposable warm-up turn.
pub const WARM_UP_TEXT: &str = "Hello.";

/// Directive for the warm-up turn.
pub const WARM_UP_INSTRUCTIONS: &str = "Read the text aloud in a neutral voice.";

/// A caller's request to synthesize one piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            instructions: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Blank voice selectors count as absent.
    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// One turn: text plus the directive the model should follow while reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSpec {
    pub text: String,
    pub instructions: String,
}

impl TurnSpec {
    /// Build a turn; empty instructions fall back to the default directive.
    pub fn new(text: impl Into<String>, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        let instructions = if instructions.trim().is_empty() {
            DEFAULT_READING_INSTRUCTIONS.to_string()
        } else {
            instructions
        };
        Self {
            text: text.into(),
            instructions,
        }
    }

    pub fn warm_up() -> Self {
        Self::new(WARM_UP_TEXT, WARM_UP_INSTRUCTIONS)
    }

    /// The opaque JSON document carried as the turn's single text block.
    pub fn content_payload(&self) -> String {
        serde_json::json!({
            "text": self.text,
            "instructions": self.instructions,
        })
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("a turn script needs at least one turn")]
    Empty,
    #[error("request text must not be empty")]
    EmptyText,
}

/// Immutable, non-empty ordered sequence of turns. The last turn is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnScript {
    turns: Vec<TurnSpec>,
}

impl TurnScript {
    /// Build a script from an explicit turn list.
    pub fn new(turns: Vec<TurnSpec>) -> Result<Self, ScriptError> {
        if turns.is_empty() {
            return Err(ScriptError::Empty);
        }
        Ok(Self { turns })
    }

    /// Script for a caller request, optionally preceded by a warm-up turn.
    pub fn for_request(request: &SynthesisRequest, warm_up: bool) -> Result<Self, ScriptError> {
        if request.text.trim().is_empty() {
            return Err(ScriptError::EmptyText);
        }

        let real = TurnSpec::new(
            request.text.clone(),
            request.instructions.clone().unwrap_or_default(),
        );

        let turns = if warm_up {
            vec![TurnSpec::warm_up(), real]
        } else {
            vec![real]
        };
        Self::new(turns)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turn(&self, index: usize) -> Option<&TurnSpec> {
        self.turns.get(index)
    }

    pub fn final_index(&self) -> usize {
        self.turns.len() - 1
    }

    pub fn is_final(&self, index: usize) -> bool {
        index == self.final_index()
    }

    pub fn turns(&self) -> &[TurnSpec] {
        &self.turns
    }
}
