//! Suspendability resolution across the class hierarchy.
//!
//! Whenever information is incomplete the answer is `normal` ("assume
//! suspendable"): the rewriting pass may then do unnecessary work, whereas a
//! wrong "never suspends" verdict would silently break coroutine semantics.

use crate::db::MethodDatabase;
use crate::entry::ClassLookup;
use crate::suspend::SuspendType;

impl MethodDatabase {
    /// Resolves the suspend classification of one method.
    ///
    /// Constructors and static initializers are structurally non-suspendable
    /// and classify as `none` regardless of any stored entry. Otherwise the
    /// starting class is resolved (decoding on miss) and its superclass chain
    /// is walked until an exact signature match is found; with
    /// `search_superclass` false the walk stops at the starting class.
    pub fn classify(
        &self,
        class_name: &str,
        method_name: &str,
        method_desc: &str,
        search_superclass: bool,
    ) -> SuspendType {
        if method_name.starts_with('<') {
            return SuspendType::None;
        }

        let Some(mut entry) = self.resolve(class_name) else {
            self.diag().warn(&format!(
                "not found class - assuming suspendable: {class_name}#{method_name}{method_desc}"
            ));
            return SuspendType::Normal;
        };

        loop {
            if let Some(ty) = entry.check(method_name, method_desc) {
                return ty;
            }
            if !search_superclass {
                break;
            }
            let Some(super_name) = entry.super_name() else {
                break;
            };
            // superclasses are read from the store only, never re-decoded
            match self.lookup(super_name) {
                Some(ClassLookup::Known(parent)) => entry = parent,
                _ => break,
            }
        }

        self.diag().warn(&format!(
            "method not found in class - assuming suspendable: {class_name}#{method_name}{method_desc}"
        ));
        SuspendType::Normal
    }
}
