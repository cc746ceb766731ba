//! Major/minor component versions.

use std::fmt;

/// A `major.minor` version as written in import statements and qmldir files.
///
/// Either part may be [`ComponentVersion::NO_VERSION`]; a version is only
/// [valid](ComponentVersion::is_valid) when both parts are set.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentVersion {
    pub major: i32,
    pub minor: i32,
}

impl ComponentVersion {
    pub const NO_VERSION: i32 = -1;
    pub const MAX_VERSION: i32 = i32::MAX;

    pub const fn new(major: i32, minor: i32) -> Self {
        Self { major, minor }
    }

    /// The unset version.
    pub const fn none() -> Self {
        Self::new(Self::NO_VERSION, Self::NO_VERSION)
    }

    /// The version that compares greater than every real version.
    pub const fn max() -> Self {
        Self::new(Self::MAX_VERSION, Self::MAX_VERSION)
    }

    pub const fn is_valid(&self) -> bool {
        self.major >= 0 && self.minor >= 0
    }

    pub const fn is_max(&self) -> bool {
        self.major == Self::MAX_VERSION && self.minor == Self::MAX_VERSION
    }

    /// Parse `"2"` or `"2.15"`. Anything else yields the unset version.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.trim().splitn(2, '.');
        let major = parts.next().and_then(|p| p.parse::<i32>().ok());
        let minor = match parts.next() {
            Some(p) => p.parse::<i32>().ok(),
            None => Some(Self::NO_VERSION),
        };
        match (major, minor) {
            (Some(major), Some(minor)) if major >= 0 => Self::new(major, minor),
            _ => Self::none(),
        }
    }

    /// Whether something declared at `self` is visible to an import of `requested`.
    ///
    /// Majors must agree and the minor must not exceed the requested one; an
    /// unversioned or maximal request sees everything.
    pub fn is_visible_at(&self, requested: ComponentVersion) -> bool {
        if !requested.is_valid() || requested.is_max() {
            return true;
        }
        self.major == requested.major && self.minor <= requested.minor
    }
}

impl Default for ComponentVersion {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.major == Self::NO_VERSION {
            return Ok(());
        }
        if self.minor == Self::NO_VERSION {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

impl fmt::Debug for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentVersion({}.{})", self.major, self.minor)
    }
}
