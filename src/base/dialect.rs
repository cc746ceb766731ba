//! Source dialects understood by the analysis.

use std::fmt;

/// The language a document (or a core import) is written in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dialect {
    NoLanguage,
    JavaScript,
    Json,
    Qml,
    QmlQtQuick2,
    QmlQtQuick2Ui,
    QmlQbs,
    QmlProject,
    QmlTypeInfo,
    AnyLanguage,
}

impl Dialect {
    const ALL: [Dialect; 10] = [
        Dialect::NoLanguage,
        Dialect::JavaScript,
        Dialect::Json,
        Dialect::Qml,
        Dialect::QmlQtQuick2,
        Dialect::QmlQtQuick2Ui,
        Dialect::QmlQbs,
        Dialect::QmlProject,
        Dialect::QmlTypeInfo,
        Dialect::AnyLanguage,
    ];

    /// Whether documents in this dialect are parsed with the QML grammar.
    pub fn is_qml_like(self) -> bool {
        matches!(
            self,
            Dialect::Qml
                | Dialect::QmlQtQuick2
                | Dialect::QmlQtQuick2Ui
                | Dialect::QmlQbs
                | Dialect::QmlProject
                | Dialect::QmlTypeInfo
        )
    }

    /// Whether this is one of the UI dialects with full import semantics.
    pub fn is_full_qml(self) -> bool {
        matches!(
            self,
            Dialect::Qml | Dialect::QmlQtQuick2 | Dialect::QmlQtQuick2Ui
        )
    }

    pub fn is_qml_like_or_js(self) -> bool {
        self.is_qml_like() || self == Dialect::JavaScript
    }

    /// Dialects whose documents may be imported from a document in `self`.
    ///
    /// Always contains `self` and `AnyLanguage` (except for `NoLanguage`).
    pub fn companion_languages(self) -> Vec<Dialect> {
        let mut langs = match self {
            Dialect::NoLanguage => return Vec::new(),
            Dialect::JavaScript | Dialect::Json | Dialect::QmlProject | Dialect::QmlTypeInfo => {
                Vec::new()
            }
            Dialect::QmlQbs => vec![Dialect::JavaScript],
            Dialect::Qml => vec![
                Dialect::QmlQtQuick2,
                Dialect::QmlQtQuick2Ui,
                Dialect::JavaScript,
            ],
            Dialect::QmlQtQuick2 | Dialect::QmlQtQuick2Ui => vec![
                Dialect::QmlQtQuick2,
                Dialect::QmlQtQuick2Ui,
                Dialect::Qml,
                Dialect::JavaScript,
            ],
            Dialect::AnyLanguage => return Self::ALL.to_vec(),
        };
        if !langs.contains(&self) {
            langs.push(self);
        }
        langs.push(Dialect::AnyLanguage);
        langs
    }

    /// Whether something written in `other` is usable from `self`.
    pub fn is_compatible_with(self, other: Dialect) -> bool {
        other == Dialect::AnyLanguage
            || self == Dialect::AnyLanguage
            || self.companion_languages().contains(&other)
    }

    /// Guess the dialect of a file from its name.
    pub fn from_file_name(file_name: &str) -> Dialect {
        let base = file_name.rsplit('/').next().unwrap_or(file_name);
        if base.ends_with(".ui.qml") {
            Dialect::QmlQtQuick2Ui
        } else if base.ends_with(".qml") {
            Dialect::Qml
        } else if base.ends_with(".js") || base.ends_with(".mjs") {
            Dialect::JavaScript
        } else if base.ends_with(".json") {
            Dialect::Json
        } else if base.ends_with(".qbs") {
            Dialect::QmlQbs
        } else if base.ends_with(".qmlproject") {
            Dialect::QmlProject
        } else if base.ends_with(".qmltypes") {
            Dialect::QmlTypeInfo
        } else {
            Dialect::NoLanguage
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dialect::NoLanguage => "NoLanguage",
            Dialect::JavaScript => "JavaScript",
            Dialect::Json => "Json",
            Dialect::Qml => "Qml",
            Dialect::QmlQtQuick2 => "QmlQtQuick2",
            Dialect::QmlQtQuick2Ui => "QmlQtQuick2Ui",
            Dialect::QmlQbs => "QmlQbs",
            Dialect::QmlProject => "QmlProject",
            Dialect::QmlTypeInfo => "QmlTypeInfo",
            Dialect::AnyLanguage => "AnyLanguage",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_name() {
        assert_eq!(Dialect::from_file_name("/a/Main.qml"), Dialect::Qml);
        assert_eq!(Dialect::from_file_name("/a/Main.ui.qml"), Dialect::QmlQtQuick2Ui);
        assert_eq!(Dialect::from_file_name("/a/logic.js"), Dialect::JavaScript);
        assert_eq!(Dialect::from_file_name("/a/logic.mjs"), Dialect::JavaScript);
        assert_eq!(Dialect::from_file_name("/a/plugins.qmltypes"), Dialect::QmlTypeInfo);
        assert_eq!(Dialect::from_file_name("/a/README"), Dialect::NoLanguage);
    }

    #[test]
    fn test_companions_include_self_and_any() {
        for d in [Dialect::Qml, Dialect::JavaScript, Dialect::QmlQbs, Dialect::QmlQtQuick2] {
            let langs = d.companion_languages();
            assert!(langs.contains(&d), "{d} should be its own companion");
            assert!(langs.contains(&Dialect::AnyLanguage));
        }
        assert!(Dialect::NoLanguage.companion_languages().is_empty());
    }

    #[test]
    fn test_compatibility() {
        assert!(Dialect::Qml.is_compatible_with(Dialect::JavaScript));
        assert!(Dialect::QmlQtQuick2.is_compatible_with(Dialect::Qml));
        assert!(!Dialect::JavaScript.is_compatible_with(Dialect::Qml));
        assert!(Dialect::JavaScript.is_compatible_with(Dialect::AnyLanguage));
    }
}
