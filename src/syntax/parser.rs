//! The boundary to the external parser.
//!
//! Analysis never parses text itself; it asks a [`Parser`] for a
//! [`ParseOutput`]. [`StaticParser`] serves prebuilt trees, which is what
//! tests and in-memory tooling use.

use std::sync::LazyLock;

use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::ast::Program;
use crate::base::{LineIndex, SourceLocation};
use crate::imports::ComponentVersion;

/// Start symbol for a parse.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParseGoal {
    Qml,
    Script,
    Module,
    Expression,
}

/// A syntax error reported by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub location: SourceLocation,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// A JavaScript header directive (`.pragma library`, `.import ...`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    PragmaLibrary {
        location: SourceLocation,
    },
    ImportFile {
        file_name: SmolStr,
        as_name: SmolStr,
        location: SourceLocation,
    },
    ImportModule {
        uri: SmolStr,
        version: ComponentVersion,
        as_name: SmolStr,
        location: SourceLocation,
    },
}

/// A source comment, without its delimiters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub location: SourceLocation,
}

/// Everything the parser hands over for one document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParseOutput {
    pub program: Option<Program>,
    pub parsed_correctly: bool,
    pub errors: Vec<SyntaxError>,
    pub directives: Vec<Directive>,
    pub comments: Vec<Comment>,
}

impl ParseOutput {
    pub fn success(program: Program) -> Self {
        Self {
            program: Some(program),
            parsed_correctly: true,
            ..Self::default()
        }
    }

    pub fn failure(error: SyntaxError) -> Self {
        Self {
            errors: vec![error],
            ..Self::default()
        }
    }

    pub fn with_directives(mut self, directives: Vec<Directive>) -> Self {
        self.directives = directives;
        self
    }

    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = comments;
        self
    }
}

/// Produces syntax trees. Implementations must be usable from several
/// worker threads at once.
pub trait Parser: Send + Sync {
    fn parse(&self, file_name: &str, source: &str, goal: ParseGoal) -> ParseOutput;
}

// ============================================================================
// HEADER SCANNING
// ============================================================================

static PRAGMA_LIBRARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\.pragma\s+library\s*;?\s*$").expect("valid regex"));

static IMPORT_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\.import\s+"([^"]+)"\s+as\s+([A-Za-z_][A-Za-z0-9_]*)\s*;?\s*$"#)
        .expect("valid regex")
});

static IMPORT_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*\.import\s+([A-Za-z_][A-Za-z0-9_.]*)\s+([0-9]+(?:\.[0-9]+)?)\s+as\s+([A-Za-z_][A-Za-z0-9_]*)\s*;?\s*$",
    )
    .expect("valid regex")
});

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//([^\n]*)").expect("valid regex"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*(.*?)\*/").expect("valid regex"));

fn line_location(index: &LineIndex, offset: usize, len: usize) -> SourceLocation {
    SourceLocation::from_offset(index, offset as u32, len as u32)
}

/// Collect the `.pragma`/`.import` header lines of a JavaScript file.
///
/// Scanning stops at the first line that is neither blank, a comment nor a
/// directive, matching where the lexer accepts them.
pub fn collect_directives(source: &str) -> Vec<Directive> {
    let index = LineIndex::new(source);
    let mut directives = Vec::new();
    let mut offset = 0usize;
    for line in source.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let text = line.trim_end_matches(['\n', '\r']);
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let location = line_location(&index, start, text.len());
        if PRAGMA_LIBRARY.is_match(text) {
            directives.push(Directive::PragmaLibrary { location });
        } else if let Some(caps) = IMPORT_FILE.captures(text) {
            directives.push(Directive::ImportFile {
                file_name: SmolStr::new(&caps[1]),
                as_name: SmolStr::new(&caps[2]),
                location,
            });
        } else if let Some(caps) = IMPORT_MODULE.captures(text) {
            directives.push(Directive::ImportModule {
                uri: SmolStr::new(&caps[1]),
                version: ComponentVersion::parse(&caps[2]),
                as_name: SmolStr::new(&caps[3]),
                location,
            });
        } else {
            break;
        }
    }
    directives
}

/// Collect every `//` and `/* */` comment in `source`.
///
/// String literals are not tracked, so a `//` inside a string yields a
/// spurious comment.
pub fn collect_comments(source: &str) -> Vec<Comment> {
    let index = LineIndex::new(source);
    let mut comments: Vec<Comment> = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();
    for caps in BLOCK_COMMENT.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        covered.push((whole.start(), whole.end()));
        comments.push(Comment {
            text: caps[1].to_string(),
            location: line_location(&index, whole.start(), whole.len()),
        });
    }
    for caps in LINE_COMMENT.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        if covered
            .iter()
            .any(|&(s, e)| whole.start() >= s && whole.start() < e)
        {
            continue;
        }
        comments.push(Comment {
            text: caps[1].to_string(),
            location: line_location(&index, whole.start(), whole.len()),
        });
    }
    comments.sort_by_key(|c| c.location.offset());
    comments
}

// ============================================================================
// STATIC PARSER
// ============================================================================

/// A parser serving trees registered ahead of time, keyed by file name.
///
/// Directives and comments are scanned from the source text when the
/// registered output carries none. Files without a registered tree parse
/// as failures.
#[derive(Default)]
pub struct StaticParser {
    outputs: RwLock<FxHashMap<SmolStr, ParseOutput>>,
}

impl StaticParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, file_name: impl Into<SmolStr>, output: ParseOutput) {
        self.outputs.write().insert(file_name.into(), output);
    }

    pub fn with(self, file_name: impl Into<SmolStr>, output: ParseOutput) -> Self {
        self.register(file_name, output);
        self
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.outputs.read().contains_key(file_name)
    }
}

impl Parser for StaticParser {
    fn parse(&self, file_name: &str, source: &str, goal: ParseGoal) -> ParseOutput {
        let registered = self.outputs.read().get(file_name).cloned();
        let mut output = registered.unwrap_or_else(|| {
            ParseOutput::failure(SyntaxError::new(
                format!("no syntax tree available for {file_name}"),
                SourceLocation::default(),
            ))
        });
        if output.directives.is_empty() && matches!(goal, ParseGoal::Script | ParseGoal::Module) {
            output.directives = collect_directives(source);
        }
        if output.comments.is_empty() {
            output.comments = collect_comments(source);
        }
        output
    }
}
