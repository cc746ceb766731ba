//! Parsed documents.
//!
//! A [`Document`] is created once from source text and never changes:
//! parsing and binding happen inside [`Document::parse`], so no caller can
//! observe a document that is parsed but not yet bound. Re-parsing builds a
//! new document.

use std::sync::Arc;

use sha1::{Digest, Sha1};
use smol_str::SmolStr;

use super::bind::{Bind, BindInput};
use super::diagnostics::{Diagnostic, codes};
use super::environment::{Environment, base_name, directory_of};
use crate::base::Dialect;
use crate::syntax::ast::{JsProgram, UiProgram};
use crate::syntax::{Comment, Directive, ParseGoal, Parser, Program};

/// An immutable, parsed and bound source file.
#[derive(Debug)]
pub struct Document {
    file_name: SmolStr,
    path: SmolStr,
    component_name: SmolStr,
    language: Dialect,
    source: Arc<str>,
    fingerprint: Vec<u8>,
    program: Option<Program>,
    parsed_correctly: bool,
    diagnostics: Vec<Diagnostic>,
    directives: Vec<Directive>,
    comments: Vec<Comment>,
    editor_revision: i32,
    bind: Bind,
}

/// The grammar start symbol for a document.
fn parse_goal(file_name: &str, language: Dialect) -> ParseGoal {
    if language.is_qml_like() {
        ParseGoal::Qml
    } else if language == Dialect::Json {
        ParseGoal::Expression
    } else if file_name.ends_with(".mjs") {
        ParseGoal::Module
    } else {
        ParseGoal::Script
    }
}

/// Component name of a QML file: its base name, if capitalized.
fn component_name_of(file_name: &str, language: Dialect) -> SmolStr {
    if !language.is_qml_like() {
        return SmolStr::default();
    }
    let base = base_name(file_name);
    if base.chars().next().is_some_and(char::is_uppercase) {
        SmolStr::new(base)
    } else {
        SmolStr::default()
    }
}

impl Document {
    /// Parse `source` and bind the result.
    ///
    /// `NoLanguage` and `AnyLanguage` are replaced by the dialect guessed
    /// from the file name.
    pub fn parse(
        file_name: &str,
        source: impl Into<Arc<str>>,
        language: Dialect,
        editor_revision: i32,
        parser: &dyn Parser,
        env: &Environment,
    ) -> Arc<Document> {
        let source = source.into();
        let language = match language {
            Dialect::NoLanguage | Dialect::AnyLanguage => Dialect::from_file_name(file_name),
            language => language,
        };
        let component_name = component_name_of(file_name, language);
        let output = parser.parse(file_name, &source, parse_goal(file_name, language));

        let mut diagnostics: Vec<Diagnostic> = output
            .errors
            .iter()
            .map(|e| {
                Diagnostic::error(file_name, e.location, e.message.as_str()).with_code(codes::SYNTAX_ERROR)
            })
            .collect();
        let bind = Bind::new(
            BindInput {
                file_name,
                component_name: &component_name,
                language,
                program: output.program.as_ref(),
                directives: &output.directives,
            },
            env,
        );
        diagnostics.extend(bind.diagnostics().iter().cloned());

        Arc::new(Document {
            file_name: SmolStr::new(file_name),
            path: SmolStr::new(directory_of(file_name)),
            component_name,
            language: bind.detected_dialect().unwrap_or(language),
            fingerprint: Sha1::digest(source.as_bytes()).to_vec(),
            source,
            program: output.program,
            parsed_correctly: output.parsed_correctly,
            diagnostics,
            directives: output.directives,
            comments: output.comments,
            editor_revision,
            bind,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Directory containing the file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Empty unless the document is a QML file with a capitalized name.
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn language(&self) -> Dialect {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// SHA-1 of the source text.
    pub fn fingerprint(&self) -> &[u8] {
        &self.fingerprint
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn qml_program(&self) -> Option<&UiProgram> {
        self.program.as_ref().and_then(Program::as_ui)
    }

    pub fn js_program(&self) -> Option<&JsProgram> {
        self.program.as_ref().and_then(Program::as_js)
    }

    pub fn is_parsed_correctly(&self) -> bool {
        self.parsed_correctly
    }

    /// Syntax errors followed by binding diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn editor_revision(&self) -> i32 {
        self.editor_revision
    }

    pub fn bind(&self) -> &Bind {
        &self.bind
    }

    /// Key of this document in the dependency index.
    pub fn import_id(&self) -> &str {
        &self.file_name
    }

    pub fn is_qml_document(&self) -> bool {
        self.language.is_qml_like()
    }

    pub fn is_full_qml_document(&self) -> bool {
        self.language.is_full_qml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{AstBuilder, ParseOutput, StaticParser, SyntaxError};

    fn parser_with(file_name: &str, output: ParseOutput) -> StaticParser {
        StaticParser::new().with(file_name, output)
    }

    #[test]
    fn test_component_name() {
        assert_eq!(component_name_of("/a/Button.qml", Dialect::Qml), "Button");
        assert_eq!(component_name_of("/a/Button.ui.qml", Dialect::QmlQtQuick2Ui), "Button");
        assert_eq!(component_name_of("/a/main.qml", Dialect::Qml), "");
        assert_eq!(component_name_of("/a/Util.js", Dialect::JavaScript), "");
    }

    #[test]
    fn test_parse_goal() {
        assert_eq!(parse_goal("/a/B.qml", Dialect::Qml), ParseGoal::Qml);
        assert_eq!(parse_goal("/a/b.mjs", Dialect::JavaScript), ParseGoal::Module);
        assert_eq!(parse_goal("/a/b.js", Dialect::JavaScript), ParseGoal::Script);
        assert_eq!(parse_goal("/a/b.json", Dialect::Json), ParseGoal::Expression);
    }

    #[test]
    fn test_parse_binds_and_fingerprints() {
        let b = AstBuilder::new();
        let program = b.ui_program(vec![b.import_module("QtQuick", "2.0", None)], b.object("Item", vec![]));
        let parser = parser_with("/app/Main.qml", ParseOutput::success(program));
        let doc = Document::parse("/app/Main.qml", "Item {}", Dialect::AnyLanguage, 3, &parser, &Environment::new());

        assert_eq!(doc.path(), "/app");
        assert_eq!(doc.component_name(), "Main");
        assert_eq!(doc.language(), Dialect::QmlQtQuick2);
        assert!(doc.is_parsed_correctly());
        assert!(doc.bind().root_object().is_some());
        assert_eq!(doc.editor_revision(), 3);
        assert_eq!(doc.fingerprint().len(), 20);
    }

    #[test]
    fn test_fingerprint_depends_only_on_source() {
        let env = Environment::new();
        let good = parser_with("/a/A.qml", ParseOutput::success(AstBuilder::new().ui_program(vec![], AstBuilder::new().object("Item", vec![]))));
        let bad = parser_with(
            "/a/A.qml",
            ParseOutput::failure(SyntaxError::new("unexpected token", Default::default())),
        );
        let a = Document::parse("/a/A.qml", "Item {", Dialect::Qml, 0, &good, &env);
        let b = Document::parse("/a/A.qml", "Item {", Dialect::Qml, 0, &bad, &env);
        let c = Document::parse("/a/A.qml", "Item {}", Dialect::Qml, 0, &good, &env);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert!(!b.is_parsed_correctly());
        assert_eq!(b.diagnostics()[0].code.as_deref(), Some(codes::SYNTAX_ERROR));
    }

    #[test]
    fn test_js_directives_are_collected() {
        let b = AstBuilder::new();
        let parser = parser_with("/app/util.js", ParseOutput::success(b.js_program(vec![])));
        let doc = Document::parse(
            "/app/util.js",
            ".pragma library\n.import \"other.js\" as Other\nvar x = 1;\n",
            Dialect::JavaScript,
            0,
            &parser,
            &Environment::new(),
        );
        assert_eq!(doc.directives().len(), 2);
        assert!(doc.bind().is_js_library());
        assert_eq!(doc.bind().imports()[0].as_name, "Other");
        assert_eq!(doc.component_name(), "");
    }
}
