use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::suspend::SuspendType;

/// Internal name of the root object type; the only class with no superclass.
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// Internal name of the exception root type.
pub const THROWABLE_CLASS: &str = "java/lang/Throwable";

/// Exact-match method identity: name plus erased parameter/return descriptor.
/// No overload resolution happens beyond this.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodKey {
    name: String,
    desc: String,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.desc)
    }
}

/// Immutable per-class metadata: direct superclass, directly-implemented
/// interfaces, and the suspend classification of every declared method.
///
/// Equality and hashing cover `(super_name, methods)` only, so the store can
/// detect the same class observed twice with divergent bytecode; the
/// interface list rides along for the rewriting stage but does not
/// participate in the comparison.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    super_name: Option<String>,
    interfaces: Vec<String>,
    methods: BTreeMap<MethodKey, SuspendType>,
}

impl ClassEntry {
    pub fn new(
        super_name: Option<String>,
        interfaces: Vec<String>,
        methods: BTreeMap<MethodKey, SuspendType>,
    ) -> Self {
        Self {
            super_name,
            interfaces,
            methods,
        }
    }

    /// Direct superclass internal name; `None` only for the root object type.
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn methods(&self) -> &BTreeMap<MethodKey, SuspendType> {
        &self.methods
    }

    /// Exact-signature lookup in this class's own method table.
    pub fn check(&self, name: &str, desc: &str) -> Option<SuspendType> {
        self.methods
            .get(&MethodKey::new(name, desc))
            .copied()
    }

    /// Rebuild this entry with some method classifications replaced.
    pub fn with_overrides(
        &self,
        overrides: impl IntoIterator<Item = (MethodKey, SuspendType)>,
    ) -> Self {
        let mut methods = self.methods.clone();
        for (key, ty) in overrides {
            methods.insert(key, ty);
        }
        Self {
            super_name: self.super_name.clone(),
            interfaces: self.interfaces.clone(),
            methods,
        }
    }
}

impl PartialEq for ClassEntry {
    fn eq(&self, other: &Self) -> bool {
        self.super_name == other.super_name && self.methods == other.methods
    }
}

impl Eq for ClassEntry {}

impl Hash for ClassEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.super_name.hash(state);
        self.methods.hash(state);
    }
}

/// Outcome of a store lookup. Absence from the map means the class was never
/// looked up; `NotFound` means a lookup was attempted and definitively failed.
#[derive(Debug, Clone)]
pub enum ClassLookup {
    Known(Arc<ClassEntry>),
    NotFound,
}

impl ClassLookup {
    pub fn known(&self) -> Option<&Arc<ClassEntry>> {
        match self {
            ClassLookup::Known(entry) => Some(entry),
            ClassLookup::NotFound => None,
        }
    }
}
