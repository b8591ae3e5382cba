//! ---
//! dl_section: "04-setup-orchestration"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Pure set arithmetic between existing and desired tables."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashSet};

use dynalocal_common::TableDefinition;

/// Names present in `existing` that no desired definition declares.
///
/// Matching is exact and case-sensitive. Duplicates on either side collapse,
/// and a desired name is never part of the result.
pub fn obsolete_tables<I, S>(existing: I, desired: &[TableDefinition]) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let wanted: HashSet<&str> = desired.iter().map(TableDefinition::name).collect();
    existing
        .into_iter()
        .filter(|name| !wanted.contains(name.as_ref()))
        .map(|name| name.as_ref().to_owned())
        .collect()
}

/// Desired definitions whose name is not in `existing`, in declaration order.
///
/// When a name is declared twice only its first definition is kept.
pub fn missing_tables<'a, I, S>(existing: I, desired: &'a [TableDefinition]) -> Vec<&'a TableDefinition>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let present: HashSet<String> = existing
        .into_iter()
        .map(|name| name.as_ref().to_owned())
        .collect();
    let mut seen = HashSet::new();
    desired
        .iter()
        .filter(|table| !present.contains(table.name()) && seen.insert(table.name()))
        .collect()
}
