//! Substitution of `${<unit>.address}` placeholders with deployed addresses.
//!
//! Two matching rules are applied, depending on where the placeholder sits:
//! - constructor and initializer arguments are a flat list, and a slot is
//!   replaced only when it equals the placeholder token exactly;
//! - post-deploy call arguments are searched at any depth, and a string leaf
//!   *containing* the token is replaced as a whole by the address.
//!
//! Both rules are idempotent: once substituted, the token no longer appears.

use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    constants::{PLACEHOLDER_PREFIX, PLACEHOLDER_SUFFIX},
    types::Unit,
};

/// A typed reference to the address of another unit
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnitRef(String);

impl UnitRef {
    /// A reference to the named unit
    pub fn new(unit: impl Into<String>) -> Self {
        Self(unit.into())
    }

    /// Parse a string that is exactly one placeholder token
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.strip_prefix(PLACEHOLDER_PREFIX)?.strip_suffix(PLACEHOLDER_SUFFIX)?;
        (!name.is_empty() && !name.contains(PLACEHOLDER_PREFIX)).then(|| Self::new(name))
    }

    /// Every placeholder token embedded anywhere in `s`
    pub fn find_all(s: &str) -> Vec<Self> {
        let mut refs = Vec::new();
        let mut rest = s;
        while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
            let after = &rest[start + PLACEHOLDER_PREFIX.len()..];
            match after.find(PLACEHOLDER_SUFFIX) {
                Some(end) => {
                    let name = &after[..end];
                    if !name.is_empty() && !name.contains(PLACEHOLDER_PREFIX) {
                        refs.push(Self::new(name));
                    }
                    rest = &after[end + PLACEHOLDER_SUFFIX.len()..];
                }
                None => break,
            }
        }
        refs
    }

    /// The name of the referenced unit
    pub fn unit(&self) -> &str {
        &self.0
    }

    /// The placeholder token standing for this reference
    pub fn token(&self) -> String {
        format!("{}{}{}", PLACEHOLDER_PREFIX, self.0, PLACEHOLDER_SUFFIX)
    }
}

impl Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

// ------------------
// | Exact matching |
// ------------------

/// Replace every slot of `args` equal to the placeholder of `unit` by `address`.
///
/// Nested lists are left untouched. Returns the number of replaced slots.
pub fn resolve_flat(args: &mut [Value], unit: &str, address: &str) -> usize {
    let token = UnitRef::new(unit).token();
    let mut replaced = 0;
    for slot in args.iter_mut() {
        if slot.as_str() == Some(token.as_str()) {
            *slot = Value::String(address.to_string());
            replaced += 1;
        }
    }
    replaced
}

/// Substitute the address of `unit` into the constructor and initializer
/// arguments of every unit in the manifest
pub fn resolve_unit_args(units: &mut IndexMap<String, Unit>, unit: &str, address: &str) -> usize {
    units
        .values_mut()
        .map(|u| {
            let ctor = u.constructor_args.as_deref_mut().map_or(0, |a| resolve_flat(a, unit, address));
            let init = u.upgrade_args.as_deref_mut().map_or(0, |a| resolve_flat(a, unit, address));
            ctor + init
        })
        .sum()
}

/// Substitute every address already recorded in the manifest
pub fn resolve_known_addresses(units: &mut IndexMap<String, Unit>) -> usize {
    let known: Vec<(String, String)> = units
        .iter()
        .filter(|(_, u)| u.has_address())
        .map(|(name, u)| (name.clone(), u.address.clone()))
        .collect();

    known.iter().map(|(name, address)| resolve_unit_args(units, name, address)).sum()
}

// -----------------------
// | Containment matching |
// -----------------------

/// Replace, at any depth of nesting, every string leaf containing the
/// placeholder of `unit` by `address`. Returns the number of replaced leaves.
pub fn resolve_nested(value: &mut Value, unit: &str, address: &str) -> usize {
    let token = UnitRef::new(unit).token();
    replace_containing(value, &token, address)
}

/// Recursive helper of [`resolve_nested`]
fn replace_containing(value: &mut Value, token: &str, address: &str) -> usize {
    match value {
        Value::Array(items) => items.iter_mut().map(|v| replace_containing(v, token, address)).sum(),
        Value::String(s) if s.contains(token) => {
            *s = address.to_string();
            1
        }
        _ => 0,
    }
}

// ----------------------
// | Reference analysis |
// ----------------------

/// A placeholder that will not be substituted as the manifest stands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceIssue {
    /// The referenced unit is not declared in the manifest
    Unknown {
        /// The unit holding the reference
        unit: String,
        /// The reference
        target: UnitRef,
    },
    /// The referenced unit is declared later and not yet deployed, so its
    /// address is unknown when the referring unit is created
    Forward {
        /// The unit holding the reference
        unit: String,
        /// The reference
        target: UnitRef,
    },
    /// The referenced unit is marked deployed but has no address recorded
    Unresolved {
        /// The unit holding the reference
        unit: String,
        /// The reference
        target: UnitRef,
    },
    /// The token is embedded in a longer string, which exact matching never replaces
    Embedded {
        /// The unit holding the reference
        unit: String,
        /// The full argument value
        value: String,
    },
}

impl Display for ReferenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceIssue::Unknown { unit, target } => {
                write!(f, "{} references undeclared unit {}", unit, target)
            }
            ReferenceIssue::Forward { unit, target } => {
                write!(f, "{} references {} which is declared after it", unit, target)
            }
            ReferenceIssue::Unresolved { unit, target } => {
                write!(f, "{} still waits on {} which has no address", unit, target)
            }
            ReferenceIssue::Embedded { unit, value } => {
                write!(f, "{} embeds a placeholder in `{}`, it will not be replaced", unit, value)
            }
        }
    }
}

/// Find the placeholders in constructor and initializer arguments of units
/// that are not yet deployed and that will not resolve in a pass over the
/// manifest in declaration order
pub fn analyze_units(units: &IndexMap<String, Unit>) -> Vec<ReferenceIssue> {
    let mut issues = Vec::new();
    for (position, (name, unit)) in units.iter().enumerate() {
        if unit.deployed {
            continue;
        }

        let args = unit.constructor_args().iter().chain(unit.upgrade_args());
        for arg in args {
            let Some(s) = arg.as_str() else { continue };
            let Some(target) = UnitRef::parse(s) else {
                if !UnitRef::find_all(s).is_empty() {
                    issues.push(ReferenceIssue::Embedded {
                        unit: name.clone(),
                        value: s.to_string(),
                    });
                }
                continue;
            };

            let issue = match units.get_full(target.unit()) {
                None => ReferenceIssue::Unknown { unit: name.clone(), target },
                Some((_, _, dep)) if dep.has_address() => continue,
                Some((idx, _, _)) if idx > position => {
                    ReferenceIssue::Forward { unit: name.clone(), target }
                }
                Some((_, _, dep)) if dep.deployed => {
                    ReferenceIssue::Unresolved { unit: name.clone(), target }
                }
                // Declared earlier, the address lands before this unit is created
                Some(_) => continue,
            };
            issues.push(issue);
        }
    }
    issues
}

/// Every reference embedded at any depth of `value`
pub fn collect_refs(value: &Value) -> Vec<UnitRef> {
    match value {
        Value::Array(items) => items.iter().flat_map(collect_refs).collect(),
        Value::String(s) => UnitRef::find_all(s),
        _ => Vec::new(),
    }
}
