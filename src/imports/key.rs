//! Import keys and how they match against each other.
//!
//! An [`ImportKey`] is the normalized form of either an import request
//! (`import QtQuick.Controls 2.15`, `import "../components"`) or of something
//! a core import can satisfy (an export). Keys are totally ordered so that
//! the dependency index can keep entries of one directory or library
//! contiguous and answer "everything under this directory" with a range scan.

use std::cmp::Ordering;
use std::fmt;

use smol_str::SmolStr;

use super::version::ComponentVersion;
use super::viewer::ViewerContext;

/// How an import refers to its target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImportType {
    Invalid,
    Library,
    Directory,
    ImplicitDirectory,
    File,
    UnknownFile,
    QrcFile,
    QrcDirectory,
}

impl ImportType {
    pub fn kind(self) -> ImportKind {
        match self {
            ImportType::Library => ImportKind::Library,
            ImportType::Directory
            | ImportType::ImplicitDirectory
            | ImportType::File
            | ImportType::UnknownFile => ImportKind::Path,
            ImportType::QrcFile | ImportType::QrcDirectory => ImportKind::QrcPath,
            ImportType::Invalid => ImportKind::Invalid,
        }
    }

    pub fn is_directory(self) -> bool {
        matches!(
            self,
            ImportType::Directory | ImportType::ImplicitDirectory | ImportType::QrcDirectory
        )
    }

    pub fn is_file(self) -> bool {
        matches!(
            self,
            ImportType::File | ImportType::UnknownFile | ImportType::QrcFile
        )
    }
}

/// Coarse grouping of [`ImportType`]s, used as the primary sort key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportKind {
    Library,
    Path,
    QrcPath,
    Invalid,
}

/// Relationship between two directory-like keys, see [`ImportKey::compare_dir`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirCompareInfo {
    SameDir,
    /// `self` lies inside the other key's directory.
    FirstInSecond,
    /// The other key lies inside `self`'s directory.
    SecondInFirst,
    Different,
    Incompatible,
}

/// How well an export matched a request.
///
/// One score per selector segment that had to be skipped (higher means a
/// more preferred selector); a plain match is `[0]`. An empty strength is
/// "no match".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImportMatchStrength {
    scores: Vec<i32>,
}

impl ImportMatchStrength {
    pub fn new(scores: Vec<i32>) -> Self {
        Self { scores }
    }

    pub fn no_match() -> Self {
        Self::default()
    }

    pub fn has_match(&self) -> bool {
        !self.scores.is_empty()
    }

    pub fn scores(&self) -> &[i32] {
        &self.scores
    }

    /// Element-wise comparison; `Greater` means `self` is the stronger match.
    ///
    /// On a common-prefix tie the shorter list wins, since it needed fewer
    /// selector directories to reach the target.
    pub fn compare_match(&self, other: &ImportMatchStrength) -> Ordering {
        for (a, b) in self.scores.iter().zip(&other.scores) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        other.scores.len().cmp(&self.scores.len())
    }
}

/// A normalized import request or export name.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportKey {
    pub ty: ImportType,
    pub split_path: Vec<SmolStr>,
    pub major_version: i32,
    pub minor_version: i32,
}

fn normalized_qrc_file_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn normalized_qrc_directory_path(path: &str) -> String {
    let mut res = normalized_qrc_file_path(path);
    if !res.ends_with('/') {
        res.push('/');
    }
    res
}

fn split_trimmed(path: &str, sep: char) -> Vec<SmolStr> {
    let mut parts: Vec<SmolStr> = path.split(sep).map(SmolStr::new).collect();
    if parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn is_selector(segment: &str) -> bool {
    segment.starts_with('+')
}

impl ImportKey {
    /// Build a key from a raw path. The split is deterministic and trailing
    /// separators of directory-like paths are dropped.
    pub fn new(ty: ImportType, path: &str, major_version: i32, minor_version: i32) -> Self {
        let split_path = match ty {
            ImportType::Library => path.split('.').map(SmolStr::new).collect(),
            ImportType::Directory | ImportType::ImplicitDirectory => split_trimmed(path, '/'),
            ImportType::File | ImportType::QrcFile => normalized_qrc_file_path(path)
                .split('/')
                .map(SmolStr::new)
                .collect(),
            ImportType::QrcDirectory => split_trimmed(&normalized_qrc_directory_path(path), '/'),
            ImportType::Invalid | ImportType::UnknownFile => {
                path.split('/').map(SmolStr::new).collect()
            }
        };
        Self {
            ty,
            split_path,
            major_version,
            minor_version,
        }
    }

    /// An unversioned key.
    pub fn unversioned(ty: ImportType, path: &str) -> Self {
        Self::new(
            ty,
            path,
            ComponentVersion::NO_VERSION,
            ComponentVersion::NO_VERSION,
        )
    }

    pub fn with_version(ty: ImportType, path: &str, version: ComponentVersion) -> Self {
        Self::new(ty, path, version.major, version.minor)
    }

    pub fn kind(&self) -> ImportKind {
        self.ty.kind()
    }

    pub fn version(&self) -> ComponentVersion {
        ComponentVersion::new(self.major_version, self.minor_version)
    }

    /// The joined path (`.` for libraries, `/` otherwise).
    pub fn path(&self) -> String {
        match self.ty {
            ImportType::Library => self.split_path.join("."),
            _ => self.split_path.join("/"),
        }
    }

    /// The same key with every `+selector` segment removed.
    pub fn flat_key(&self) -> ImportKey {
        if matches!(self.ty, ImportType::Invalid | ImportType::Library) {
            return self.clone();
        }
        if !self.split_path.iter().any(|s| is_selector(s)) {
            return self.clone();
        }
        ImportKey {
            split_path: self
                .split_path
                .iter()
                .filter(|s| !is_selector(s))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// The smallest key of this kind with the same path, for range scans
    /// that must include every version and type of that path.
    pub(crate) fn lower_bound_for_path(&self) -> ImportKey {
        let ty = match self.kind() {
            ImportKind::Library => ImportType::Library,
            ImportKind::Path => ImportType::Directory,
            ImportKind::QrcPath => ImportType::QrcFile,
            ImportKind::Invalid => ImportType::Invalid,
        };
        ImportKey {
            ty,
            split_path: self.split_path.clone(),
            major_version: i32::MIN,
            minor_version: i32::MIN,
        }
    }

    /// Whether `self` has the same kind as `other` and its path starts with
    /// all of `other`'s segments.
    pub(crate) fn has_path_prefix(&self, other: &ImportKey) -> bool {
        self.kind() == other.kind() && self.split_path.starts_with(&other.split_path)
    }

    /// The directory key a file key lives in (the key itself for directories).
    pub fn directory_key(&self) -> ImportKey {
        if self.ty.is_directory() || self.ty == ImportType::Library {
            return self.clone();
        }
        let mut split_path = self.split_path.clone();
        if split_path.len() > 1 {
            split_path.pop();
        }
        let ty = if self.ty == ImportType::QrcFile {
            ImportType::QrcDirectory
        } else {
            ImportType::Directory
        };
        ImportKey {
            ty,
            split_path,
            major_version: ComponentVersion::NO_VERSION,
            minor_version: ComponentVersion::NO_VERSION,
        }
    }

    /// Total order: kind, then path segments, then version, then type.
    pub fn compare(&self, other: &ImportKey) -> Ordering {
        self.kind()
            .cmp(&other.kind())
            .then_with(|| self.split_path.cmp(&other.split_path))
            .then_with(|| self.major_version.cmp(&other.major_version))
            .then_with(|| self.minor_version.cmp(&other.minor_version))
            .then_with(|| self.ty.cmp(&other.ty))
    }

    /// Match `self` (something a core import provides) against the request `o`.
    pub fn match_import(&self, o: &ImportKey, ctx: &ViewerContext) -> ImportMatchStrength {
        if self.major_version != o.major_version || self.minor_version > o.minor_version {
            return ImportMatchStrength::no_match();
        }
        let mut dir_to_file = false;
        let compatible = match o.ty {
            ImportType::Invalid => false,
            ImportType::Directory | ImportType::ImplicitDirectory => match self.ty {
                ImportType::File | ImportType::UnknownFile => {
                    dir_to_file = true;
                    true
                }
                ImportType::Directory | ImportType::ImplicitDirectory => true,
                _ => false,
            },
            ImportType::Library => self.ty == ImportType::Library,
            ImportType::QrcDirectory => match self.ty {
                ImportType::QrcFile => {
                    dir_to_file = true;
                    true
                }
                ImportType::QrcDirectory => true,
                _ => false,
            },
            ImportType::UnknownFile | ImportType::File => {
                matches!(self.ty, ImportType::UnknownFile | ImportType::File)
            }
            ImportType::QrcFile => self.ty == ImportType::QrcFile,
        };
        if !compatible {
            return ImportMatchStrength::no_match();
        }

        let mut res = Vec::new();
        let len1 = if dir_to_file {
            self.split_path.len().saturating_sub(1)
        } else {
            self.split_path.len()
        };
        let len2 = o.split_path.len();
        let n_selectors = ctx.selectors.len();
        let (mut i1, mut i2, mut i_selector) = (0usize, 0usize, 0usize);

        while i1 < len1 {
            if len2 - i2 > len1 - i1 {
                return ImportMatchStrength::no_match();
            }
            let p1 = &self.split_path[i1];
            if i2 < len2 && *p1 == o.split_path[i2] {
                i1 += 1;
                i2 += 1;
                continue;
            }
            let Some(selector) = p1.strip_prefix('+') else {
                return ImportMatchStrength::no_match();
            };
            while i_selector < n_selectors && ctx.selectors[i_selector] != selector {
                i_selector += 1;
            }
            if i_selector == n_selectors {
                return ImportMatchStrength::no_match();
            }
            res.push((n_selectors - i_selector) as i32);
            i_selector += 1;
            i1 += 1;
        }
        if i2 != len2 {
            return ImportMatchStrength::no_match();
        }
        if res.is_empty() {
            res.push(0);
        }
        ImportMatchStrength::new(res)
    }

    /// Classify how `self` relates to `super_dir` as directories.
    ///
    /// File keys are compared by their containing directory and selector
    /// segments are treated as belonging to the directory above them.
    pub fn compare_dir(&self, super_dir: &ImportKey) -> DirCompareInfo {
        let compatible = match super_dir.ty {
            ImportType::UnknownFile
            | ImportType::File
            | ImportType::Directory
            | ImportType::ImplicitDirectory => matches!(
                self.ty,
                ImportType::File
                    | ImportType::ImplicitDirectory
                    | ImportType::Directory
                    | ImportType::UnknownFile
            ),
            ImportType::QrcDirectory | ImportType::QrcFile => {
                matches!(self.ty, ImportType::QrcDirectory | ImportType::QrcFile)
            }
            ImportType::Invalid | ImportType::Library => false,
        };
        if !compatible {
            return DirCompareInfo::Incompatible;
        }

        let mut len1 = self.split_path.len();
        let mut len2 = super_dir.split_path.len();
        if !self.ty.is_directory() && len1 > 0 {
            len1 -= 1;
        }
        if !super_dir.ty.is_directory() && len2 > 0 {
            len2 -= 1;
        }

        let (mut i1, mut i2) = (0usize, 0usize);
        while i1 < len1 && i2 < len2 {
            let p1 = &self.split_path[i1];
            let p2 = &super_dir.split_path[i2];
            if p1 == p2 {
                i1 += 1;
                i2 += 1;
                continue;
            }
            return match (is_selector(p1), is_selector(p2)) {
                (true, true) => DirCompareInfo::SameDir,
                (true, false) => DirCompareInfo::SecondInFirst,
                (false, true) => DirCompareInfo::FirstInSecond,
                (false, false) => DirCompareInfo::Different,
            };
        }
        if i1 < len1 {
            if is_selector(&self.split_path[i1]) {
                return DirCompareInfo::SameDir;
            }
            return DirCompareInfo::FirstInSecond;
        }
        if i2 < len2 {
            if is_selector(&super_dir.split_path[i2]) {
                return DirCompareInfo::SameDir;
            }
            return DirCompareInfo::SecondInFirst;
        }
        DirCompareInfo::SameDir
    }
}

impl PartialOrd for ImportKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ImportKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Debug for ImportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImportKey({:?} {:?} {}.{})",
            self.ty,
            self.path(),
            self.major_version,
            self.minor_version
        )
    }
}

impl fmt::Display for ImportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())?;
        let version = self.version();
        if version.major != ComponentVersion::NO_VERSION {
            write!(f, " {version}")?;
        }
        Ok(())
    }
}
