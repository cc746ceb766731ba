//! The import dependency index.
//!
//! A bipartite graph between *core imports* (one per document or library,
//! keyed by an import id such as a file path) and the [`ImportKey`]s they
//! export. The forward side lives in each [`CoreImport`]; the reverse index
//! maps every export key to the ids providing it. Both sides are only ever
//! touched through `attach`/`detach`, so they cannot drift apart.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use smol_str::SmolStr;
use thiserror::Error;
use tracing::{trace, warn};

use super::key::{DirCompareInfo, ImportKey, ImportKind, ImportMatchStrength};
use super::viewer::ViewerContext;
use crate::base::Dialect;

// ============================================================================
// EXPORTS AND CORE IMPORTS
// ============================================================================

/// Something a core import can satisfy.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Export {
    pub export_name: ImportKey,
    /// Import path that must be active in the viewer for this export to be
    /// visible; empty means always visible.
    pub path_required: SmolStr,
    pub type_name: SmolStr,
    /// Owned by the core import and replaced together with it.
    pub intrinsic: bool,
}

impl Export {
    pub fn new(
        export_name: ImportKey,
        path_required: impl Into<SmolStr>,
        type_name: impl Into<SmolStr>,
        intrinsic: bool,
    ) -> Self {
        Self {
            export_name,
            path_required: path_required.into(),
            type_name: type_name.into(),
            intrinsic,
        }
    }

    pub fn visible_in(&self, vctx: &ViewerContext) -> bool {
        self.path_required.is_empty() || vctx.has_path(&self.path_required)
    }
}

/// One importable thing: a parsed document or a discovered library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreImport {
    pub import_id: SmolStr,
    pub possible_exports: BTreeSet<Export>,
    pub language: Dialect,
    pub fingerprint: Vec<u8>,
}

impl CoreImport {
    pub fn new(
        import_id: impl Into<SmolStr>,
        language: Dialect,
        fingerprint: Vec<u8>,
    ) -> Self {
        Self {
            import_id: import_id.into(),
            possible_exports: BTreeSet::new(),
            language,
            fingerprint,
        }
    }

    /// Stand-in created when an export is registered before its owner.
    pub fn placeholder(import_id: impl Into<SmolStr>) -> Self {
        Self::new(import_id, Dialect::AnyLanguage, Vec::new())
    }

    pub fn with_export(mut self, export: Export) -> Self {
        self.possible_exports.insert(export);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.fingerprint.is_empty()
    }

    fn exports_key(&self, key: &ImportKey) -> bool {
        self.possible_exports.iter().any(|e| &e.export_name == key)
    }
}

/// One candidate returned by [`ImportDependencies::candidate_imports`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedImport {
    pub match_strength: ImportMatchStrength,
    pub import_key: ImportKey,
    pub core_import_id: SmolStr,
}

impl MatchedImport {
    /// Strongest first, then by key and id for a stable order.
    pub fn compare(&self, other: &MatchedImport) -> Ordering {
        other
            .match_strength
            .compare_match(&self.match_strength)
            .then_with(|| self.import_key.cmp(&other.import_key))
            .then_with(|| self.core_import_id.cmp(&other.core_import_id))
    }
}

/// A violation of the bidirectional index invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("core import {import_id} exports {key:?} but the cache does not list it")]
    MissingCacheEntry { import_id: SmolStr, key: ImportKey },

    #[error("cache lists {import_id} for {key:?} but no such export exists")]
    DanglingCacheEntry { import_id: SmolStr, key: ImportKey },

    #[error("cache entry for {0:?} is empty")]
    EmptyCacheEntry(ImportKey),
}

// ============================================================================
// INDEX
// ============================================================================

type ImportCache = BTreeMap<ImportKey, BTreeSet<SmolStr>>;

fn attach(cache: &mut ImportCache, key: &ImportKey, import_id: &SmolStr) {
    cache
        .entry(key.clone())
        .or_default()
        .insert(import_id.clone());
}

fn detach(cache: &mut ImportCache, key: &ImportKey, import_id: &str) {
    if let Some(ids) = cache.get_mut(key) {
        ids.remove(import_id);
        if ids.is_empty() {
            cache.remove(key);
        }
    }
}

/// Forward and reverse index over every core import in a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportDependencies {
    core_imports: BTreeMap<SmolStr, CoreImport>,
    import_cache: ImportCache,
}

impl ImportDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.core_imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core_imports.is_empty()
    }

    pub fn core_import(&self, import_id: &str) -> Option<&CoreImport> {
        self.core_imports.get(import_id)
    }

    pub fn core_imports(&self) -> impl Iterator<Item = &CoreImport> {
        self.core_imports.values()
    }

    /// Ids of every core import exporting exactly `key`.
    pub fn import_ids_for(&self, key: &ImportKey) -> impl Iterator<Item = &SmolStr> {
        self.import_cache.get(key).into_iter().flatten()
    }

    pub fn export_keys(&self) -> impl Iterator<Item = &ImportKey> {
        self.import_cache.keys()
    }

    /// Insert or replace a core import.
    ///
    /// Intrinsic exports of a previous import with the same id are dropped;
    /// the others are carried over into `import`.
    pub fn add_core_import(&mut self, mut import: CoreImport) {
        trace!(
            import_id = %import.import_id,
            exports = import.possible_exports.len(),
            "add core import"
        );
        if let Some(old) = self.core_imports.remove(&import.import_id) {
            for export in old.possible_exports {
                detach(&mut self.import_cache, &export.export_name, &old.import_id);
                if !export.intrinsic {
                    import.possible_exports.insert(export);
                }
            }
        }
        for export in &import.possible_exports {
            attach(&mut self.import_cache, &export.export_name, &import.import_id);
        }
        self.core_imports.insert(import.import_id.clone(), import);
        self.debug_check();
    }

    /// Remove a core import's intrinsic exports.
    ///
    /// Independently added exports survive on a placeholder import; the
    /// import disappears entirely once none are left.
    pub fn remove_core_import(&mut self, import_id: &str) {
        let Some(mut core) = self.core_imports.remove(import_id) else {
            warn!(import_id, "removing unknown core import");
            return;
        };
        trace!(import_id, "remove core import");
        let intrinsic: Vec<Export> = core
            .possible_exports
            .iter()
            .filter(|e| e.intrinsic)
            .cloned()
            .collect();
        for export in intrinsic {
            core.possible_exports.remove(&export);
            if !core.exports_key(&export.export_name) {
                detach(&mut self.import_cache, &export.export_name, import_id);
            }
        }
        if !core.possible_exports.is_empty() {
            core.language = Dialect::AnyLanguage;
            core.fingerprint.clear();
            self.core_imports.insert(core.import_id.clone(), core);
        }
        self.debug_check();
    }

    /// Register a single non-intrinsic export, creating a placeholder core
    /// import when `import_id` is not known yet.
    pub fn add_export(
        &mut self,
        import_id: &str,
        export_name: ImportKey,
        path_required: &str,
        type_name: &str,
    ) {
        trace!(import_id, key = ?export_name, "add export");
        let core = self
            .core_imports
            .entry(SmolStr::new(import_id))
            .or_insert_with(|| CoreImport::placeholder(import_id));
        let export = Export::new(export_name, path_required, type_name, false);
        attach(&mut self.import_cache, &export.export_name, &core.import_id);
        core.possible_exports.insert(export);
        self.debug_check();
    }

    pub fn remove_export(
        &mut self,
        import_id: &str,
        export_name: ImportKey,
        path_required: &str,
        type_name: &str,
    ) {
        let Some(core) = self.core_imports.get_mut(import_id) else {
            warn!(import_id, key = ?export_name, "removing export of unknown core import");
            return;
        };
        let export = Export::new(export_name, path_required, type_name, false);
        if !core.possible_exports.remove(&export) {
            warn!(import_id, key = ?export.export_name, "removing unknown export");
            return;
        }
        trace!(import_id, key = ?export.export_name, "remove export");
        if !core.exports_key(&export.export_name) {
            detach(&mut self.import_cache, &export.export_name, import_id);
        }
        if core.possible_exports.is_empty() && core.is_placeholder() {
            self.core_imports.remove(import_id);
        }
        self.debug_check();
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Cache entries that could possibly satisfy `key`: the same library at
    /// any version, or everything below the directory `key` refers to.
    fn scan_range<'a>(
        &'a self,
        key: &ImportKey,
    ) -> impl Iterator<Item = (&'a ImportKey, &'a BTreeSet<SmolStr>)> + 'a {
        let base = match key.kind() {
            ImportKind::Library => key.clone(),
            _ if key.ty.is_file() => key.directory_key(),
            _ => key.clone(),
        };
        let start = base.lower_bound_for_path();
        let library = key.kind() == ImportKind::Library;
        let dir_base = base.clone();
        self.import_cache
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(k, _)| {
                if library {
                    k.kind() == ImportKind::Library && k.split_path == base.split_path
                } else {
                    k.has_path_prefix(&base)
                }
            })
            .filter(move |(k, _)| {
                library
                    || matches!(
                        k.compare_dir(&dir_base),
                        DirCompareInfo::SameDir | DirCompareInfo::FirstInSecond
                    )
            })
    }

    fn visible_core<'a>(&'a self, import_id: &str, vctx: &ViewerContext) -> Option<&'a CoreImport> {
        self.core_imports
            .get(import_id)
            .filter(|core| vctx.language_is_compatible(core.language))
    }

    /// Walk every export able to satisfy `key` in `vctx`.
    ///
    /// Stops early and returns `false` when `f` does.
    pub fn iterate_on_candidate_imports<F>(&self, key: &ImportKey, vctx: &ViewerContext, mut f: F) -> bool
    where
        F: FnMut(&ImportMatchStrength, &Export, &CoreImport) -> bool,
    {
        for (export_key, ids) in self.scan_range(key) {
            let strength = export_key.match_import(key, vctx);
            if !strength.has_match() {
                continue;
            }
            for id in ids {
                let Some(core) = self.visible_core(id, vctx) else {
                    continue;
                };
                for export in core
                    .possible_exports
                    .iter()
                    .filter(|e| &e.export_name == export_key && e.visible_in(vctx))
                {
                    if !f(&strength, export, core) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Every candidate for `key`, grouped by the flattened export key, each
    /// group sorted strongest first.
    pub fn candidate_imports(
        &self,
        key: &ImportKey,
        vctx: &ViewerContext,
    ) -> BTreeMap<ImportKey, Vec<MatchedImport>> {
        let mut res: BTreeMap<ImportKey, Vec<MatchedImport>> = BTreeMap::new();
        self.iterate_on_candidate_imports(key, vctx, |strength, export, core| {
            let matched = MatchedImport {
                match_strength: strength.clone(),
                import_key: export.export_name.clone(),
                core_import_id: core.import_id.clone(),
            };
            let group = res.entry(export.export_name.flat_key()).or_default();
            if !group.contains(&matched) {
                group.push(matched);
            }
            true
        });
        for group in res.values_mut() {
            group.sort_by(MatchedImport::compare);
        }
        res
    }

    /// Walk every library export, in key order.
    pub fn iterate_on_library_imports<F>(&self, vctx: &ViewerContext, mut f: F) -> bool
    where
        F: FnMut(&Export, &CoreImport) -> bool,
    {
        for (key, ids) in &self.import_cache {
            if key.kind() != ImportKind::Library {
                break;
            }
            for id in ids {
                let Some(core) = self.visible_core(id, vctx) else {
                    continue;
                };
                for export in core
                    .possible_exports
                    .iter()
                    .filter(|e| &e.export_name == key && e.visible_in(vctx))
                {
                    if !f(export, core) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Walk every export located inside the directory `base` (including the
    /// directory itself and selector subdirectories).
    pub fn iterate_on_sub_imports<F>(&self, base: &ImportKey, vctx: &ViewerContext, mut f: F) -> bool
    where
        F: FnMut(&Export, &CoreImport, DirCompareInfo) -> bool,
    {
        let dir = base.directory_key();
        for (key, ids) in self.scan_range(&dir) {
            let info = key.compare_dir(&dir);
            for id in ids {
                let Some(core) = self.visible_core(id, vctx) else {
                    continue;
                };
                for export in core
                    .possible_exports
                    .iter()
                    .filter(|e| &e.export_name == key && e.visible_in(vctx))
                {
                    if !f(export, core, info) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// A reduced copy holding only what `vctx` can see.
    pub fn filter(&self, vctx: &ViewerContext) -> ImportDependencies {
        let mut res = ImportDependencies::new();
        for core in self.core_imports.values() {
            if !vctx.language_is_compatible(core.language) {
                continue;
            }
            let mut kept = core.clone();
            kept.possible_exports.retain(|e| e.visible_in(vctx));
            if kept.possible_exports.is_empty() && core.is_placeholder() {
                continue;
            }
            for export in &kept.possible_exports {
                attach(&mut res.import_cache, &export.export_name, &kept.import_id);
            }
            res.core_imports.insert(kept.import_id.clone(), kept);
        }
        res.debug_check();
        res
    }

    /// Verify that both sides of the index agree. O(n·m); meant for tests
    /// and debug builds.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        for core in self.core_imports.values() {
            for export in &core.possible_exports {
                let listed = self
                    .import_cache
                    .get(&export.export_name)
                    .is_some_and(|ids| ids.contains(&core.import_id));
                if !listed {
                    return Err(ConsistencyError::MissingCacheEntry {
                        import_id: core.import_id.clone(),
                        key: export.export_name.clone(),
                    });
                }
            }
        }
        for (key, ids) in &self.import_cache {
            if ids.is_empty() {
                return Err(ConsistencyError::EmptyCacheEntry(key.clone()));
            }
            for id in ids {
                let exported = self
                    .core_imports
                    .get(id)
                    .is_some_and(|core| core.exports_key(key));
                if !exported {
                    return Err(ConsistencyError::DanglingCacheEntry {
                        import_id: id.clone(),
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn debug_check(&self) {
        #[cfg(debug_assertions)]
        if let Err(err) = self.check_consistency() {
            panic!("import dependency index inconsistent: {err}");
        }
    }
}
