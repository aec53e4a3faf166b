//! The method-suspendability database: a concurrent, monotonic cache of
//! per-class metadata plus a lighter superclass index.
//!
//! Both caches support lock-free reads and safe concurrent writes; the only
//! synchronized region is the narrow compare-and-log step that diagnoses
//! divergent duplicate registrations. Population is monotonic, so callers may
//! observe a partially-populated universe and must tolerate fallback answers
//! instead of blocking for completeness.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

use crate::classfile::ClassFileDecoder;
use crate::classpath::{ClassByteSource, ClasspathSource};
use crate::config::{DbConfig, SuspendRules};
use crate::diag::Diagnostics;
use crate::entry::{ClassEntry, ClassLookup};

pub struct MethodDatabase {
    config: DbConfig,
    diag: Arc<dyn Diagnostics>,
    source: Box<dyn ClassByteSource>,
    decoder: ClassFileDecoder,
    rules: SuspendRules,
    classes: DashMap<String, ClassLookup>,
    super_index: DashMap<String, String>,
    divergence_gate: Mutex<()>,
    work_list: Mutex<Vec<PathBuf>>,
}

impl MethodDatabase {
    pub fn new(
        config: DbConfig,
        source: Box<dyn ClassByteSource>,
        diag: Arc<dyn Diagnostics>,
    ) -> Self {
        let decoder = ClassFileDecoder::new(&config);
        Self {
            config,
            diag,
            source,
            decoder,
            rules: SuspendRules::default(),
            classes: DashMap::new(),
            super_index: DashMap::new(),
            divergence_gate: Mutex::new(()),
            work_list: Mutex::new(Vec::new()),
        }
    }

    pub fn with_classpath(
        config: DbConfig,
        roots: Vec<PathBuf>,
        diag: Arc<dyn Diagnostics>,
    ) -> Self {
        Self::new(config, Box::new(ClasspathSource::new(roots)), diag)
    }

    pub fn with_rules(mut self, rules: SuspendRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn diag(&self) -> &dyn Diagnostics {
        self.diag.as_ref()
    }

    pub fn decoder(&self) -> &ClassFileDecoder {
        &self.decoder
    }

    /// Lock-free read of the current store state for one class. `None` means
    /// the class was never looked up.
    pub fn lookup(&self, class_name: &str) -> Option<ClassLookup> {
        self.classes.get(class_name).map(|r| r.clone())
    }

    /// Number of classes with a live metadata record.
    pub fn known_classes(&self) -> usize {
        self.classes
            .iter()
            .filter(|r| matches!(r.value(), ClassLookup::Known(_)))
            .count()
    }

    pub fn indexed_superclasses(&self) -> usize {
        self.super_index.len()
    }

    /// Registers or replaces the metadata record for a class, overlaying any
    /// configured suspend rules. Last write wins; a differing prior record is
    /// diagnosed with a warning because it means the same class was observed
    /// twice with inconsistent bytecode.
    pub fn record(&self, class_name: &str, entry: ClassEntry) -> Arc<ClassEntry> {
        let entry = match self.rules.for_class(class_name) {
            Some(overrides) => Arc::new(entry.with_overrides(overrides.iter().cloned())),
            None => Arc::new(entry),
        };
        let prior = self
            .classes
            .insert(class_name.to_string(), ClassLookup::Known(entry.clone()));
        if let Some(ClassLookup::Known(old)) = prior {
            // Only the compare-and-log step is serialized; map reads and
            // writes stay lock-free.
            let _gate = self.divergence_gate.lock();
            if *old != *entry {
                self.diag.warn(&format!(
                    "duplicate class entries with different data for class: {class_name}"
                ));
            }
        }
        entry
    }

    /// Marks a class as definitively unresolvable, unless a record already
    /// exists. Distinct from absence, which means "not yet looked up."
    pub fn mark_not_found(&self, class_name: &str) {
        self.classes
            .entry(class_name.to_string())
            .or_insert(ClassLookup::NotFound);
    }

    /// Resolves the full metadata record for a class, decoding on miss and
    /// building the superclass family into the store so chain walks afterward
    /// read from the store only.
    pub fn resolve(&self, class_name: &str) -> Option<Arc<ClassEntry>> {
        if let Some(lookup) = self.lookup(class_name) {
            return lookup.known().cloned();
        }

        let entry = self.build_entry(class_name)?;
        let mut super_name = entry.super_name().map(str::to_string);
        while let Some(name) = super_name {
            super_name = match self.lookup(&name) {
                Some(ClassLookup::Known(parent)) => parent.super_name().map(str::to_string),
                Some(ClassLookup::NotFound) => None,
                None => self
                    .build_entry(&name)
                    .and_then(|parent| parent.super_name().map(str::to_string)),
            };
        }
        Some(entry)
    }

    fn build_entry(&self, class_name: &str) -> Option<Arc<ClassEntry>> {
        let bytes = match self.source.class_bytes(class_name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.mark_not_found(class_name);
                return None;
            }
            Err(err) => {
                self.diag
                    .error(&format!("failed to load bytes for {class_name}: {err:#}"));
                self.mark_not_found(class_name);
                return None;
            }
        };

        match self.decoder.decode_full(&bytes) {
            Ok(decoded) => {
                if decoded.name != class_name {
                    self.diag.warn(&format!(
                        "class name mismatch: requested {class_name}, decoded {}",
                        decoded.name
                    ));
                }
                Some(self.record(class_name, decoded.entry))
            }
            Err(err) => {
                self.diag
                    .error(&format!("cannot analyze class {class_name}: {err}"));
                self.mark_not_found(class_name);
                None
            }
        }
    }

    /// Direct superclass of a class. A full metadata record always takes
    /// precedence; otherwise the superclass index answers, populated on
    /// demand from a minimal superclass-only decode.
    pub fn direct_superclass(&self, class_name: &str) -> Option<String> {
        if let Some(ClassLookup::Known(entry)) = self.lookup(class_name) {
            return entry.super_name().map(str::to_string);
        }
        if let Some(cached) = self.super_index.get(class_name) {
            return Some(cached.clone());
        }

        let super_name = self.extract_superclass(class_name)?;
        let prior = self
            .super_index
            .insert(class_name.to_string(), super_name.clone());
        if let Some(old) = prior {
            let _gate = self.divergence_gate.lock();
            if old != super_name {
                self.diag.warn(&format!(
                    "duplicate super class entry with different value for {class_name}: {old} vs {super_name}"
                ));
            }
        }
        Some(super_name)
    }

    fn extract_superclass(&self, class_name: &str) -> Option<String> {
        let bytes = match self.source.class_bytes(class_name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                self.diag
                    .error(&format!("failed to load bytes for {class_name}: {err:#}"));
                return None;
            }
        };
        match self.decoder.decode_superclass_only(&bytes) {
            Ok(super_name) => super_name,
            Err(err) => {
                self.diag
                    .error(&format!("cannot extract super class of {class_name}: {err}"));
                None
            }
        }
    }

    /// Appends a file needing instrumentation. Scan order, no deduplication.
    pub fn push_work(&self, path: PathBuf) {
        self.work_list.lock().push(path);
    }

    /// Snapshot of the accumulated work list, in append order.
    pub fn work_list(&self) -> Vec<PathBuf> {
        self.work_list.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::testutil::ClassFileBuilder;
    use crate::classpath::testsource::MapSource;
    use crate::config::SUSPEND_MARKER;
    use crate::diag::{CollectingDiagnostics, Severity};
    use crate::entry::{MethodKey, OBJECT_CLASS};
    use crate::suspend::SuspendType;
    use std::collections::BTreeMap;

    fn empty_db(diag: Arc<CollectingDiagnostics>) -> MethodDatabase {
        MethodDatabase::with_classpath(DbConfig::default(), Vec::new(), diag)
    }

    fn entry_with(super_name: &str, methods: &[(&str, &str, SuspendType)]) -> ClassEntry {
        let methods = methods
            .iter()
            .map(|(n, d, t)| (MethodKey::new(*n, *d), *t))
            .collect();
        ClassEntry::new(Some(super_name.to_string()), Vec::new(), methods)
    }

    #[test]
    fn identical_reregistration_is_silent() {
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = empty_db(diag.clone());

        let entry = entry_with(OBJECT_CLASS, &[("run", "()V", SuspendType::Normal)]);
        db.record("a/Foo", entry.clone());
        db.record("a/Foo", entry);
        assert_eq!(diag.count(Severity::Warn), 0);
        assert_eq!(db.known_classes(), 1);
    }

    #[test]
    fn divergent_reregistration_warns_once_and_last_write_wins() {
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = empty_db(diag.clone());

        db.record("a/Foo", entry_with(OBJECT_CLASS, &[("run", "()V", SuspendType::Normal)]));
        db.record("a/Foo", entry_with(OBJECT_CLASS, &[("run", "()V", SuspendType::None)]));

        assert_eq!(diag.count(Severity::Warn), 1);
        let lookup = db.lookup("a/Foo").unwrap();
        let entry = lookup.known().unwrap();
        assert_eq!(entry.check("run", "()V"), Some(SuspendType::None));
    }

    #[test]
    fn concurrent_divergent_registration_keeps_one_record_one_warning() {
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = Arc::new(empty_db(diag.clone()));

        let a = entry_with(OBJECT_CLASS, &[("run", "()V", SuspendType::Normal)]);
        let b = entry_with(OBJECT_CLASS, &[("run", "()V", SuspendType::Blocking)]);

        let handles: Vec<_> = [a, b]
            .into_iter()
            .map(|entry| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    db.record("a/Foo", entry);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(db.known_classes(), 1);
        assert_eq!(diag.count(Severity::Warn), 1);
    }

    #[test]
    fn not_found_never_clobbers_a_record() {
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = empty_db(diag);

        db.record("a/Foo", entry_with(OBJECT_CLASS, &[]));
        db.mark_not_found("a/Foo");
        assert!(db.lookup("a/Foo").unwrap().known().is_some());

        db.mark_not_found("a/Gone");
        assert!(db.lookup("a/Gone").unwrap().known().is_none());
        assert!(db.lookup("a/NeverSeen").is_none());
    }

    #[test]
    fn resolve_decodes_the_superclass_family_into_the_store() {
        let base = ClassFileBuilder::new("a/Base", Some(OBJECT_CLASS))
            .method(0x0001, "run", "()V", &[SUSPEND_MARKER])
            .build();
        let leaf = ClassFileBuilder::new("a/Leaf", Some("a/Base"))
            .method(0x0001, "other", "()V", &[])
            .build();
        let source = MapSource::new().insert("a/Base", base).insert("a/Leaf", leaf);

        let diag = Arc::new(CollectingDiagnostics::new());
        let db = MethodDatabase::new(DbConfig::default(), Box::new(source), diag);

        let entry = db.resolve("a/Leaf").unwrap();
        assert_eq!(entry.super_name(), Some("a/Base"));
        assert!(db.lookup("a/Base").unwrap().known().is_some());
        // the root object type was looked up and is not on the classpath
        assert!(db.lookup(OBJECT_CLASS).unwrap().known().is_none());
    }

    #[test]
    fn resolve_of_unknown_class_marks_not_found() {
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = empty_db(diag);

        assert!(db.resolve("a/Missing").is_none());
        assert!(db.lookup("a/Missing").unwrap().known().is_none());
    }

    #[test]
    fn direct_superclass_prefers_the_full_store() {
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = empty_db(diag);

        db.record("a/Foo", entry_with("a/Parent", &[]));
        assert_eq!(db.direct_superclass("a/Foo"), Some("a/Parent".to_string()));
        assert_eq!(db.indexed_superclasses(), 0);
    }

    #[test]
    fn direct_superclass_falls_back_to_minimal_decode() {
        let bytes = ClassFileBuilder::new("a/Foo", Some("a/Parent")).build();
        let source = MapSource::new().insert("a/Foo", bytes);
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = MethodDatabase::new(DbConfig::default(), Box::new(source), diag);

        assert_eq!(db.direct_superclass("a/Foo"), Some("a/Parent".to_string()));
        assert_eq!(db.indexed_superclasses(), 1);
        // the index answers without touching the source again
        assert_eq!(db.direct_superclass("a/Foo"), Some("a/Parent".to_string()));
    }

    #[test]
    fn rules_overlay_applies_on_record() {
        let rules: SuspendRules = {
            let path = std::env::temp_dir().join(format!(
                "corowave_db_rules_{}_{}.json",
                std::process::id(),
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
            ));
            std::fs::write(&path, r#"{"a/Foo": {"run()V": "blocking"}}"#).unwrap();
            let rules = SuspendRules::load(&path).unwrap();
            let _ = std::fs::remove_file(path);
            rules
        };

        let diag = Arc::new(CollectingDiagnostics::new());
        let db = empty_db(diag).with_rules(rules);

        let entry = db.record(
            "a/Foo",
            ClassEntry::new(
                Some(OBJECT_CLASS.to_string()),
                Vec::new(),
                BTreeMap::from([(MethodKey::new("run", "()V"), SuspendType::None)]),
            ),
        );
        assert_eq!(entry.check("run", "()V"), Some(SuspendType::Blocking));
    }

    #[test]
    fn work_list_preserves_append_order_without_dedup() {
        let diag = Arc::new(CollectingDiagnostics::new());
        let db = empty_db(diag);

        db.push_work(PathBuf::from("a.class"));
        db.push_work(PathBuf::from("b.class"));
        db.push_work(PathBuf::from("a.class"));
        assert_eq!(
            db.work_list(),
            vec![
                PathBuf::from("a.class"),
                PathBuf::from("b.class"),
                PathBuf::from("a.class")
            ]
        );
    }
}
