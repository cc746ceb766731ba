//! Import keys, versions and the dependency index.
//!
//! - [`ImportKey`] - Normalized import request or export name
//! - [`ImportMatchStrength`] - Score of a selector-aware match
//! - [`ImportDependencies`] - Core imports and the reverse export index
//! - [`ViewerContext`] - Selectors, paths and dialect a document is viewed in
//!
//! This module depends only on `base`.

mod dependencies;
mod key;
mod version;
mod viewer;

pub use dependencies::{ConsistencyError, CoreImport, Export, ImportDependencies, MatchedImport};
pub use key::{DirCompareInfo, ImportKey, ImportKind, ImportMatchStrength, ImportType};
pub use version::ComponentVersion;
pub use viewer::ViewerContext;
