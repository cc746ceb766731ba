//! Diagnostics: semantic problem reporting.
//!
//! Nothing in analysis fails hard. Problems found while binding or linking
//! become [`Diagnostic`]s attached to a document path, collected by a
//! [`DiagnosticCollector`].

use std::sync::Arc;

use indexmap::IndexMap;

use crate::base::SourceLocation;

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    /// Type information for a library is still being produced.
    ReadingTypeInfoWarning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning | Severity::ReadingTypeInfoWarning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Severity::Warning | Severity::ReadingTypeInfoWarning)
    }
}

/// A diagnostic message with location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Path of the document the diagnostic belongs to.
    pub path: Arc<str>,
    pub location: SourceLocation,
    pub severity: Severity,
    /// Error/warning code (e.g., "E0101").
    pub code: Option<Arc<str>>,
    pub message: Arc<str>,
    pub related: Vec<RelatedInfo>,
}

/// Related information for a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedInfo {
    pub path: Arc<str>,
    pub location: SourceLocation,
    pub message: Arc<str>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        path: impl Into<Arc<str>>,
        location: SourceLocation,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            path: path.into(),
            location,
            severity,
            code: None,
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(
        path: impl Into<Arc<str>>,
        location: SourceLocation,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self::new(Severity::Error, path, location, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(
        path: impl Into<Arc<str>>,
        location: SourceLocation,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self::new(Severity::Warning, path, location, message)
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add related information.
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Standard diagnostic codes.
pub mod codes {
    /// Import target not found (file, directory or module).
    pub const IMPORT_NOT_FOUND: &str = "E0101";
    /// A required import declared by a qmldir file is missing.
    pub const IMPLICIT_IMPORT_MISSING: &str = "E0102";
    /// Type information for a plugin could not be produced.
    pub const TYPE_INFO_FAILED: &str = "E0103";
    /// Syntax tree nested deeper than the binder walks.
    pub const MAX_RECURSION: &str = "E0104";
    /// Two `@scope` annotations disagree.
    pub const CONFLICTING_SCOPE: &str = "E0105";
    /// Inline component declared somewhere it cannot be.
    pub const NESTED_INLINE_COMPONENT: &str = "E0106";
    /// Syntax error reported by the parser.
    pub const SYNTAX_ERROR: &str = "E0001";

    /// Library type information not read yet.
    pub const READING_TYPE_INFO: &str = "W0101";
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics during analysis.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// An import whose target does not exist.
    pub fn import_not_found(
        &mut self,
        path: &str,
        location: SourceLocation,
        message: impl Into<Arc<str>>,
    ) {
        self.add(Diagnostic::error(path, location, message).with_code(codes::IMPORT_NOT_FOUND));
    }

    /// A required qmldir import that could not be resolved.
    pub fn implicit_import_missing(
        &mut self,
        path: &str,
        location: SourceLocation,
        module: &str,
        importer: &str,
        search_paths: &[String],
    ) {
        let message = format!(
            "Implicit import '{module}' of QML module '{importer}' not found.\n\nImport paths:\n{}",
            search_paths.join("\n")
        );
        self.add(
            Diagnostic::error(path, location, message).with_code(codes::IMPLICIT_IMPORT_MISSING),
        );
    }

    /// Type information for `library` is still pending.
    pub fn reading_type_info(&mut self, path: &str, location: SourceLocation, library: &str) {
        self.add(
            Diagnostic::new(
                Severity::ReadingTypeInfoWarning,
                path,
                location,
                format!("QML module contains C++ plugins, currently reading type information... {library}"),
            )
            .with_code(codes::READING_TYPE_INFO),
        );
    }

    pub fn type_info_failed(&mut self, path: &str, location: SourceLocation, error: &str) {
        self.add(
            Diagnostic::error(
                path,
                location,
                format!("QML module contains C++ plugins, failed to dump types: {error}"),
            )
            .with_code(codes::TYPE_INFO_FAILED),
        );
    }

    pub fn max_recursion(&mut self, path: &str, location: SourceLocation) {
        self.add(
            Diagnostic::error(path, location, "Hit maximal recursion depth in AST visit")
                .with_code(codes::MAX_RECURSION),
        );
    }

    /// Get all diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get diagnostics for a specific document.
    pub fn diagnostics_for_file(&self, path: &str) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| &*d.path == path).collect()
    }

    /// Diagnostics grouped by document path, in first-reported order.
    pub fn by_path(&self) -> IndexMap<Arc<str>, Vec<&Diagnostic>> {
        let mut map: IndexMap<Arc<str>, Vec<&Diagnostic>> = IndexMap::new();
        for diag in &self.diagnostics {
            map.entry(diag.path.clone()).or_default().push(diag);
        }
        map
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Get the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity.is_warning()).count()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Take all diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Clear all diagnostics.
    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}
