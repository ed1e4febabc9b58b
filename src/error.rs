use std::fmt;
use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};

/// Errors raised while building an engine. Nothing on the per-block path
/// returns these; blocks report problems through `BlockOutcome` instead.
#[derive(Debug)]
pub enum EngineError {
    Descriptor(DescriptorError),
    Arena(ArenaError),
    ArenaTooSmall { required: usize, available: usize },
    LayoutOverflow { required: usize },
    InvalidConfig(String),
}

/// Out-of-range or misaligned access into an `Arena`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    OutOfBounds { offset: usize, len: usize, size: usize },
    Misaligned { offset: usize },
}

/// A UI descriptor that failed to parse.
#[derive(Debug)]
pub struct DescriptorError {
    pub message: String,
    /// 1-based line reported by the JSON parser (0 when unknown).
    pub line: usize,
    /// 1-based column reported by the JSON parser (0 when unknown).
    pub column: usize,
}

impl DescriptorError {
    /// Render a caret diagnostic pointing at the failing position in `source`.
    pub fn report(&self, source: &str) -> String {
        let offset = byte_offset(source, self.line, self.column);
        let span: Range<usize> = offset..(offset + 1).min(source.len()).max(offset);
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, ("descriptor", span.clone()))
            .with_config(Config::default().with_color(false))
            .with_message("invalid UI descriptor")
            .with_label(Label::new(("descriptor", span)).with_message(&self.message))
            .finish()
            .write(("descriptor", Source::from(source)), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut offset = 0;
    for (n, text) in source.split_inclusive('\n').enumerate() {
        if n + 1 == line {
            return (offset + column.saturating_sub(1)).min(source.len());
        }
        offset += text.len();
    }
    source.len()
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Descriptor(e) => write!(f, "Descriptor error: {e}"),
            EngineError::Arena(e) => write!(f, "Arena error: {e}"),
            EngineError::ArenaTooSmall { required, available } => write!(
                f,
                "Arena too small: layout needs {required} bytes, arena has {available}"
            ),
            EngineError::LayoutOverflow { required } => write!(
                f,
                "Layout needs {required} bytes, which does not fit in a 32-bit pointer slot"
            ),
            EngineError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::OutOfBounds { offset, len, size } => write!(
                f,
                "Access of {len} bytes at offset {offset} exceeds arena size {size}"
            ),
            ArenaError::Misaligned { offset } => {
                write!(f, "Offset {offset} is not aligned to 4 bytes")
            }
        }
    }
}

impl std::error::Error for ArenaError {}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{} at line {} column {}", self.message, self.line, self.column)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for DescriptorError {}

impl From<serde_json::Error> for DescriptorError {
    fn from(e: serde_json::Error) -> Self {
        DescriptorError {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        }
    }
}

impl From<DescriptorError> for EngineError {
    fn from(e: DescriptorError) -> Self {
        EngineError::Descriptor(e)
    }
}

impl From<ArenaError> for EngineError {
    fn from(e: ArenaError) -> Self {
        EngineError::Arena(e)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Descriptor(e.into())
    }
}
