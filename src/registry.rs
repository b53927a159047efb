//! Process-wide named-grouper registry (spec §5 "Shared state"): the only
//! shared state outside a single `Partitioner` call. Built with
//! `std::sync::OnceLock<RwLock<HashMap<...>>>` — read-mostly, write-once at
//! process start, torn down with the process. `CostModel`/`GroupingCost`
//! instances stay per-call and never touch this table.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use crate::frequency::FrequencyTable;
use crate::interrupt::InterruptionToken;
use crate::partition::{GroupOptions, GroupOutcome};

/// the kind of target a registered grouper is built for; groupers are keyed
/// by this plus a name so a caller can ask for "the categorical grouper
/// named X" without knowing its concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Categorical,
    Continuous,
}

/// a pluggable grouping strategy, implemented by anything with the same
/// shape as [`crate::partition::group`].
pub trait Grouper: Send + Sync {
    fn group(&self, source: &FrequencyTable, options: GroupOptions, interrupt: &dyn InterruptionToken) -> GroupOutcome;
}

impl<F> Grouper for F
where
    F: Fn(&FrequencyTable, GroupOptions, &dyn InterruptionToken) -> GroupOutcome + Send + Sync,
{
    fn group(&self, source: &FrequencyTable, options: GroupOptions, interrupt: &dyn InterruptionToken) -> GroupOutcome {
        self(source, options, interrupt)
    }
}

type GrouperFactory = Arc<dyn Fn() -> Arc<dyn Grouper> + Send + Sync>;

#[derive(Debug)]
pub struct UnknownGrouper {
    pub target_type: TargetType,
    pub name: String,
}

impl fmt::Display for UnknownGrouper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no grouper named {:?} registered for {:?}", self.name, self.target_type)
    }
}

impl std::error::Error for UnknownGrouper {}

fn table() -> &'static RwLock<HashMap<(TargetType, String), GrouperFactory>> {
    static TABLE: OnceLock<RwLock<HashMap<(TargetType, String), GrouperFactory>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// registers a grouper factory under `(target_type, name)`, overwriting any
/// prior registration with the same key. Intended for process start-up;
/// callers that register after groupers are already in use must accept the
/// brief write-lock contention themselves.
pub fn register(target_type: TargetType, name: impl Into<String>, factory: impl Fn() -> Arc<dyn Grouper> + Send + Sync + 'static) {
    let mut guard = table().write().expect("registry lock poisoned");
    guard.insert((target_type, name.into()), Arc::new(factory));
}

/// looks up and instantiates the grouper registered under `(target_type,
/// name)`.
pub fn resolve(target_type: TargetType, name: &str) -> Result<Arc<dyn Grouper>, UnknownGrouper> {
    let guard = table().read().expect("registry lock poisoned");
    match guard.get(&(target_type, name.to_string())) {
        Some(factory) => Ok(factory()),
        None => Err(UnknownGrouper {
            target_type,
            name: name.to_string(),
        }),
    }
}

/// names currently registered for a given target type, for diagnostics and
/// tests.
pub fn registered_names(target_type: TargetType) -> Vec<String> {
    let guard = table().read().expect("registry lock poisoned");
    guard.keys().filter(|(t, _)| *t == target_type).map(|(_, name)| name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::NeverInterrupted;

    struct EchoGrouper;
    impl Grouper for EchoGrouper {
        fn group(&self, source: &FrequencyTable, options: GroupOptions, interrupt: &dyn InterruptionToken) -> GroupOutcome {
            crate::partition::group(source, options, interrupt)
        }
    }

    #[test]
    fn register_then_resolve_round_trips() {
        register(TargetType::Categorical, "mdl-grouping-registry-test", || Arc::new(EchoGrouper));
        let grouper = resolve(TargetType::Categorical, "mdl-grouping-registry-test").expect("registered above");
        let table = FrequencyTable::new(vec![]);
        let outcome = grouper.group(&table, GroupOptions::default(), &NeverInterrupted);
        assert_eq!(outcome.table.vector_count(), 0);
    }

    #[test]
    fn unknown_name_reports_both_key_parts() {
        let err = resolve(TargetType::Continuous, "definitely-not-registered").unwrap_err();
        assert_eq!(err.name, "definitely-not-registered");
        assert_eq!(err.target_type, TargetType::Continuous);
    }
}
