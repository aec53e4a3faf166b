//! Ancestry queries over the metadata store and superclass index.
//!
//! Chains are reconstructed by repeated key lookups against the flat store,
//! never by following object references, so cyclic structures cannot arise:
//! every walk terminates at one of the two fixed root types or at a
//! resolution failure.

use crate::db::MethodDatabase;
use crate::entry::{OBJECT_CLASS, THROWABLE_CLASS};

impl MethodDatabase {
    /// Nearest common superclass of two classes, or `None` when either
    /// ancestor chain cannot be fully resolved.
    ///
    /// Both chains are built root-first and compared positionally; the last
    /// mutually-agreeing entry is the answer. Two resolvable classes always
    /// share at least the root object type; chains that disagree even at
    /// position zero report unknown.
    pub fn common_superclass(&self, class_a: &str, class_b: &str) -> Option<String> {
        let chain_a = self.ancestor_chain(class_a)?;
        let chain_b = self.ancestor_chain(class_b)?;

        let num = chain_a.len().min(chain_b.len());
        let mut idx = 0;
        while idx < num && chain_a[idx] == chain_b[idx] {
            idx += 1;
        }
        if idx > 0 {
            Some(chain_a[idx - 1].clone())
        } else {
            None
        }
    }

    /// Whether a class descends from the exception root type. Unresolvable
    /// ancestry answers false, with a warning.
    pub fn is_exception(&self, class_name: &str) -> bool {
        let mut current = class_name.to_string();
        loop {
            if current == THROWABLE_CLASS {
                return true;
            }
            if current == OBJECT_CLASS {
                return false;
            }
            match self.direct_superclass(&current) {
                Some(super_name) => current = super_name,
                None => {
                    self.diag()
                        .warn(&format!("can't determine super class of {current}"));
                    return false;
                }
            }
        }
    }

    /// Root-first ancestor chain ending at the class itself, or `None` when
    /// an ancestor cannot be resolved before the root is reached.
    fn ancestor_chain(&self, class_name: &str) -> Option<Vec<String>> {
        let mut chain = Vec::new();
        let mut current = class_name.to_string();
        loop {
            chain.push(current.clone());
            if current == OBJECT_CLASS {
                chain.reverse();
                return Some(chain);
            }
            match self.direct_superclass(&current) {
                Some(super_name) => current = super_name,
                None => {
                    self.diag()
                        .warn(&format!("can't determine super class of {current}"));
                    return None;
                }
            }
        }
    }
}
