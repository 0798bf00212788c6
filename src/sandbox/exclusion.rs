//! Ambient-name and structural deny lists.
//!
//! Two independent lists:
//! - [`DENIED_GLOBALS`]: ambient bindings that never reach sandboxed code
//!   (runtime control objects, raw code-execution primitives, low-level
//!   system/crypto modules, module-loading hooks, console).
//! - [`STRUCTURAL_DENYLIST`]: attribute names denied on *every* wrapped value,
//!   because they lead back to shared prototype machinery.

use std::collections::BTreeSet;

/// Ambient binding names that are always denied.
pub const DENIED_GLOBALS: &[&str] = &[
    "sys",
    "wasi",
    "crypto",
    "global",
    "process",
    "undefined",
    "require",
    "Function",
    "eval",
    "module",
    "exports",
    "__filename",
    "__dirname",
    "console",
];

/// Attribute names that are never forwarded on any stand-in.
pub const STRUCTURAL_DENYLIST: &[&str] = &["__proto__", "constructor", "prototype"];

/// Check a name against the static ambient deny list.
///
/// ```
/// use scopebox::sandbox::is_excluded;
///
/// assert!(is_excluded("require"));
/// assert!(is_excluded("eval"));
/// assert!(!is_excluded("Math"));
/// ```
pub fn is_excluded(name: &str) -> bool {
    DENIED_GLOBALS.contains(&name)
}

/// Check an attribute name against the structural deny list.
///
/// Applies to any target, regardless of identity.
pub fn is_structurally_denied(name: &str) -> bool {
    STRUCTURAL_DENYLIST.contains(&name)
}

/// The static deny list plus any names added by configuration.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    extra: BTreeSet<String>,
}

impl ExclusionSet {
    /// Static deny list only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Static deny list extended with `extra` names.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extra: extra
                .into_iter()
                .map(Into::into)
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        is_excluded(name) || self.extra.contains(name)
    }

    /// Every denied name, static ones first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        DENIED_GLOBALS
            .iter()
            .copied()
            .chain(self.extra.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_execution_primitives_denied() {
        assert!(is_excluded("eval"));
        assert!(is_excluded("Function"));
        assert!(is_excluded("require"));
        assert!(is_excluded("console"));
    }

    #[test]
    fn standard_builtins_allowed() {
        assert!(!is_excluded("Math"));
        assert!(!is_excluded("JSON"));
        assert!(!is_excluded("Object"));
        assert!(!is_excluded("globalThis"));
    }

    #[test]
    fn structural_names() {
        assert!(is_structurally_denied("__proto__"));
        assert!(is_structurally_denied("constructor"));
        assert!(is_structurally_denied("prototype"));
        assert!(!is_structurally_denied("length"));
        assert!(!is_structurally_denied("name"));
    }

    #[test]
    fn structural_check_is_separate_from_ambient_check() {
        assert!(!is_excluded("constructor"));
        assert!(!is_structurally_denied("require"));
    }

    #[test]
    fn extra_names_extend_static_list() {
        let set = ExclusionSet::with_extra(["fetch", "", "setTimeout"]);
        assert!(set.is_excluded("fetch"));
        assert!(set.is_excluded("setTimeout"));
        assert!(set.is_excluded("require"));
        assert!(!set.is_excluded(""));
        assert!(!set.is_excluded("Math"));

        let names: Vec<&str> = set.names().collect();
        assert_eq!(names.len(), DENIED_GLOBALS.len() + 2);
        assert_eq!(names[0], DENIED_GLOBALS[0]);
    }
}
