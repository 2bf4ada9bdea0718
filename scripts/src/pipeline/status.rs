//! A read-only report of how far a manifest has progressed

use std::fmt::{self, Display};

use crate::{
    placeholder::{analyze_units, collect_refs, ReferenceIssue, UnitRef},
    store::{CallManifest, StateStore},
};

/// The recorded state of a single unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitStatus {
    /// The unit name
    pub name: String,
    /// The artifact instantiated for the unit
    pub contract: String,
    /// The recorded address, empty if none
    pub address: String,
    /// Whether the unit is deployed
    pub deployed: bool,
    /// Whether the unit is upgraded
    pub upgraded: bool,
    /// Whether the unit is verified
    pub verified: bool,
}

/// The recorded state of a single call directive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallStatus {
    /// `Target.function`
    pub label: String,
    /// Whether the directive is active
    pub active: bool,
    /// Whether the directive has been called
    pub called: bool,
    /// Referenced units without an address
    pub waiting_on: Vec<UnitRef>,
}

/// A snapshot of both manifests
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    /// Every unit, in declaration order
    pub units: Vec<UnitStatus>,
    /// Every directive, in declaration order
    pub calls: Vec<CallStatus>,
    /// Placeholders in unit arguments that will not resolve
    pub issues: Vec<ReferenceIssue>,
}

impl StatusReport {
    /// Build the report for the given manifests
    pub fn new(state: &StateStore, calls: &CallManifest) -> Self {
        let units = state
            .units()
            .iter()
            .map(|(name, unit)| UnitStatus {
                name: name.clone(),
                contract: unit.artifact(name).to_string(),
                address: unit.address.clone(),
                deployed: unit.deployed,
                upgraded: unit.is_upgraded(),
                verified: unit.verified,
            })
            .collect();

        let calls = calls
            .directives()
            .iter()
            .map(|directive| {
                let waiting_on = directive
                    .args
                    .iter()
                    .flat_map(collect_refs)
                    .filter(|r| !state.get(r.unit()).is_some_and(|u| u.has_address()))
                    .collect();
                CallStatus {
                    label: format!("{}.{}", directive.name, directive.function_name),
                    active: directive.call,
                    called: directive.called,
                    waiting_on,
                }
            })
            .collect();

        Self { units, calls, issues: analyze_units(state.units()) }
    }

    /// The number of units not yet deployed
    pub fn pending_units(&self) -> usize {
        self.units.iter().filter(|u| !u.deployed).count()
    }

    /// The number of active directives not yet called
    pub fn pending_calls(&self) -> usize {
        self.calls.iter().filter(|c| c.active && !c.called).count()
    }
}

/// A check mark for a flag
fn mark(flag: bool) -> &'static str {
    if flag {
        "x"
    } else {
        "-"
    }
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Units ({} pending):", self.pending_units())?;
        writeln!(f, "  {:<24} {:<24} dep upg ver address", "name", "contract")?;
        for unit in &self.units {
            writeln!(
                f,
                "  {:<24} {:<24}  {}   {}   {}  {}",
                unit.name,
                unit.contract,
                mark(unit.deployed),
                mark(unit.upgraded),
                mark(unit.verified),
                unit.address
            )?;
        }

        writeln!(f, "Calls ({} pending):", self.pending_calls())?;
        for call in &self.calls {
            let state = match (call.active, call.called) {
                (_, true) => "called",
                (true, false) => "pending",
                (false, false) => "inactive",
            };
            write!(f, "  {:<40} {}", call.label, state)?;
            if !call.waiting_on.is_empty() {
                let refs: Vec<String> = call.waiting_on.iter().map(UnitRef::to_string).collect();
                write!(f, " (waiting on {})", refs.join(", "))?;
            }
            writeln!(f)?;
        }

        if !self.issues.is_empty() {
            writeln!(f, "Reference issues:")?;
            for issue in &self.issues {
                writeln!(f, "  {}", issue)?;
            }
        }
        Ok(())
    }
}
