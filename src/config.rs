use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::entry::MethodKey;
use crate::suspend::SuspendType;

/// Exception internal name that marks a method as suspendable when it appears
/// in the method's throws clause.
pub const SUSPEND_MARKER: &str = "corowave/SuspendExecution";

/// Class attribute left behind by the rewriting pass on instrumented classes.
pub const INSTRUMENTED_ATTRIBUTE: &str = "CorowaveInstrumented";

/// Behavior toggles consulted by the decoder and the rewriting stage. The
/// classification algorithm itself interprets none of these.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Permit synchronized suspendable methods. When false such a method is
    /// an unrecoverable decode failure.
    pub allow_monitors: bool,
    /// Permit calls classified `blocking`; forwarded to the rewriting stage.
    pub allow_blocking: bool,
    pub verbose: bool,
    pub debug: bool,
    pub marker_exception: String,
    pub instrumented_attribute: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            allow_monitors: false,
            allow_blocking: false,
            verbose: false,
            debug: false,
            marker_exception: SUSPEND_MARKER.to_string(),
            instrumented_attribute: INSTRUMENTED_ATTRIBUTE.to_string(),
        }
    }
}

/// Externally configured suspend classifications, overlaid onto every record
/// registered for a class. The file format is a JSON object keyed by internal
/// class name, each value mapping `name(desc)ret` method signatures to
/// suspend-type mnemonics:
///
/// ```json
/// { "com/example/Socket": { "read([B)I": "blocking", "close()V": "ignore" } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SuspendRules {
    by_class: HashMap<String, Vec<(MethodKey, SuspendType)>>,
}

impl SuspendRules {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file: {}", path.display()))?;
        let parsed: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse rules file: {}", path.display()))?;

        let mut by_class = HashMap::new();
        for (class_name, methods) in parsed {
            let mut entries = Vec::with_capacity(methods.len());
            for (signature, mnemonic) in methods {
                let key = parse_signature(&signature).with_context(|| {
                    format!("bad method signature {signature:?} for class {class_name}")
                })?;
                let ty = mnemonic
                    .parse::<SuspendType>()
                    .with_context(|| format!("bad suspend type for {class_name}#{signature}"))?;
                entries.push((key, ty));
            }
            by_class.insert(class_name, entries);
        }
        Ok(Self { by_class })
    }

    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    pub fn for_class(&self, class_name: &str) -> Option<&[(MethodKey, SuspendType)]> {
        self.by_class.get(class_name).map(Vec::as_slice)
    }
}

fn parse_signature(signature: &str) -> Result<MethodKey> {
    let open = signature
        .find('(')
        .with_context(|| format!("missing '(' in {signature:?}"))?;
    let (name, desc) = signature.split_at(open);
    anyhow::ensure!(!name.is_empty(), "empty method name in {signature:?}");
    Ok(MethodKey::new(name, desc))
}
