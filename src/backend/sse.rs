use std::str::FromStr;

use serde_json::{Map, Value};

use crate::errors::ChatError;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnprefixedLines {
    #[default]
    Passthrough,
    Ignore,
}

impl FromStr for UnprefixedLines {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "passthrough" => Ok(UnprefixedLines::Passthrough),
            "ignore" => Ok(UnprefixedLines::Ignore),
            other => Err(format!(
                "unprefixed line policy must be `passthrough` or `ignore`, got {other:?}"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Framing {
    pub unprefixed: UnprefixedLines,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Skip,
    Chunk(String),
    Done,
}

#[derive(Debug, PartialEq, Eq)]
enum Extracted {
    Text(String),
    Empty,
    Unrecognized,
}

#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    scanned: usize,
    max_line_bytes: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn with_max_line(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_line_bytes,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ChatError> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(offset) = self.pending[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let index = self.scanned + offset;
            let line = self.pending.drain(..=index).collect::<Vec<_>>();
            lines.push(decode_line_bytes(&line[..index]));
            self.scanned = 0;
        }
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_line_bytes {
            return Err(ChatError::Parse(format!(
                "line exceeds {} bytes without a terminator",
                self.max_line_bytes
            )));
        }
        Ok(lines)
    }

    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(decode_line_bytes(&line))
    }
}

fn decode_line_bytes(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.strip_suffix('\r').unwrap_or(&line).to_owned()
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
    framing: Framing,
}

impl SseDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            lines: LineBuffer::default(),
            framing,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<LineEvent>, ChatError> {
        let framing = self.framing;
        Ok(self
            .lines
            .push(bytes)?
            .iter()
            .map(|line| decode_line(line, framing))
            .filter(|event| *event != LineEvent::Skip)
            .collect())
    }

    pub fn finish(&mut self) -> Option<LineEvent> {
        let line = self.lines.finish()?;
        match decode_line(&line, self.framing) {
            LineEvent::Skip => None,
            event => Some(event),
        }
    }
}

pub fn decode_line(line: &str, framing: Framing) -> LineEvent {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineEvent::Skip;
    }

    if let Some(payload) = trimmed.strip_prefix(DATA_PREFIX) {
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return LineEvent::Done;
        }
        if payload.is_empty() {
            return LineEvent::Skip;
        }
        return match extract_data_text(payload) {
            Extracted::Text(text) => LineEvent::Chunk(text),
            Extracted::Empty => LineEvent::Skip,
            Extracted::Unrecognized => LineEvent::Chunk(payload.to_owned()),
        };
    }

    match framing.unprefixed {
        UnprefixedLines::Ignore => LineEvent::Skip,
        UnprefixedLines::Passthrough => match extract_plain_text(trimmed) {
            Extracted::Text(text) => LineEvent::Chunk(text),
            Extracted::Empty => LineEvent::Skip,
            Extracted::Unrecognized => LineEvent::Chunk(line.to_owned()),
        },
    }
}

fn extract_data_text(payload: &str) -> Extracted {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(payload) else {
        return Extracted::Unrecognized;
    };

    let choice = object
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first());
    let candidates = [
        choice.and_then(|choice| choice.pointer("/delta/content")),
        choice.and_then(|choice| choice.get("text")),
        choice.and_then(|choice| choice.pointer("/message/content")),
        object.get("text"),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(text) = candidate.as_str().filter(|text| !text.is_empty()) {
            return Extracted::Text(text.to_owned());
        }
    }

    if is_textless_frame(&object) {
        Extracted::Empty
    } else {
        Extracted::Unrecognized
    }
}

// Role-only and finish deltas, usage frames with no choices, and empty
// legacy text. Anything else without a string is an unknown dialect.
fn is_textless_frame(object: &Map<String, Value>) -> bool {
    let Some(choices) = object.get("choices").and_then(Value::as_array) else {
        return object.get("text").and_then(Value::as_str) == Some("");
    };
    let Some(choice) = choices.first() else {
        return true;
    };

    match choice.get("delta") {
        Some(Value::Object(delta)) => delta.iter().all(|(key, value)| match key.as_str() {
            "role" => true,
            "content" => value.is_null() || value.as_str() == Some(""),
            _ => value.is_null(),
        }),
        Some(_) => false,
        None => choice.get("text").and_then(Value::as_str) == Some(""),
    }
}

fn extract_plain_text(line: &str) -> Extracted {
    let Ok(value) = serde_json::from_str::<Value>(line) else {
        return Extracted::Unrecognized;
    };
    match value.get("text").and_then(Value::as_str) {
        Some("") => Extracted::Empty,
        Some(text) => Extracted::Text(text.to_owned()),
        None => Extracted::Unrecognized,
    }
}
