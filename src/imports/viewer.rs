//! The context a document is viewed in.

use smol_str::SmolStr;

use crate::base::Dialect;

/// Describes the environment a document is analysed for: which file
/// selectors are active, which import paths exist and which dialect the
/// viewer understands.
///
/// The same snapshot can be linked against different viewer contexts
/// (e.g. a desktop and an embedded target with different `+selector`s).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewerContext {
    /// Active file selectors in priority order (highest first), without the
    /// leading `+`.
    pub selectors: Vec<SmolStr>,
    /// Import paths searched for libraries.
    pub paths: Vec<SmolStr>,
    /// Directories searched for loose `.qmltypes` files.
    pub application_directories: Vec<SmolStr>,
    pub language: Dialect,
}

impl Default for ViewerContext {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            paths: Vec::new(),
            application_directories: Vec::new(),
            language: Dialect::Qml,
        }
    }
}

impl ViewerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_application_directories<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.application_directories = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_language(mut self, language: Dialect) -> Self {
        self.language = language;
        self
    }

    /// Whether a core import written in `language` may be used here.
    pub fn language_is_compatible(&self, language: Dialect) -> bool {
        self.language.is_compatible_with(language)
    }

    /// Position of a selector in the priority list.
    pub fn selector_index(&self, selector: &str) -> Option<usize> {
        self.selectors.iter().position(|s| s == selector)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}
