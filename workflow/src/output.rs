use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::TaskId;

/// Values a task publishes for its dependents, e.g. derived file paths,
/// blinding flags, or classifier column names.
/// Keys are kept sorted so serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Output(Map<String, Value>);

impl Output {
    /// Set `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Get a list of strings. A single string is treated as a list of one;
    /// a missing key gives an empty list.
    pub fn get_strs(&self, key: &str) -> Vec<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(vals)) => vals.iter().filter_map(Value::as_str).collect(),
            _ => Vec::with_capacity(0),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// The part an upstream task plays for a dependent.
/// Stages look dependencies up by role instead of by inspecting their kind.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// data or simulation the task processes
    Sim,
    LcFit,
    Classifier,
    /// trained classifier used by a predicting classifier
    Model,
    Aggregation,
    /// merged fit results used as data for bias correction
    Merge,
    SimBiasCor,
    SimCcPrior,
    BiasCor,
    CreateCov,
    CosmoFit,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Sim => "sim",
            Role::LcFit => "lcfit",
            Role::Classifier => "classifier",
            Role::Model => "model",
            Role::Aggregation => "aggregation",
            Role::Merge => "merge",
            Role::SimBiasCor => "sim_biascor",
            Role::SimCcPrior => "sim_ccprior",
            Role::BiasCor => "biascor",
            Role::CreateCov => "create_cov",
            Role::CosmoFit => "cosmofit",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed dependency slots: which upstream task fills which role.
/// A task's dependency set is exactly the set of ids in its slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slots {
    slots: Vec<(Role, TaskId)>,
}

impl Slots {
    /// Fill `role` with `id`. Filling the same role twice with the same id is a no-op.
    pub fn push(&mut self, role: Role, id: TaskId) {
        if !self.slots.contains(&(role, id)) {
            self.slots.push((role, id));
        }
    }

    /// First task filling `role`, if any.
    pub fn first(&self, role: Role) -> Option<TaskId> {
        self.all(role).next()
    }

    /// Every task filling `role`, in the order they were added.
    pub fn all(&self, role: Role) -> impl Iterator<Item = TaskId> + '_ {
        self.slots
            .iter()
            .filter(move |(r, _)| *r == role)
            .map(|(_, id)| *id)
    }

    /// Unique dependency ids, in the order they were first added.
    pub fn ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = Vec::with_capacity(self.slots.len());
        for (_, id) in &self.slots {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Role, TaskId)> {
        self.slots.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_output_getters() {
        let mut out = Output::default();
        out.set("sim_name", "SIM_A")
            .set("blind", false)
            .set("versions", vec!["V1", "V2"]);
        assert_eq!(out.get_str("sim_name"), Some("SIM_A"));
        assert_eq!(out.get_bool("blind"), Some(false));
        assert_eq!(out.get_strs("versions"), vec!["V1", "V2"]);
        assert_eq!(out.get_strs("sim_name"), vec!["SIM_A"]);
        assert!(out.get_strs("missing").is_empty());
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(json, r#"{"blind":false,"sim_name":"SIM_A","versions":["V1","V2"]}"#);
    }

    #[test]
    fn test_slots_dedupe() {
        let mut slots = Slots::default();
        slots.push(Role::Sim, TaskId::from(3));
        slots.push(Role::SimBiasCor, TaskId::from(3));
        slots.push(Role::SimBiasCor, TaskId::from(3));
        slots.push(Role::Classifier, TaskId::from(1));
        assert_eq!(slots.first(Role::Sim), Some(TaskId::from(3)));
        assert_eq!(slots.all(Role::SimBiasCor).count(), 1);
        assert_eq!(slots.ids(), vec![TaskId::from(3), TaskId::from(1)]);
        assert_eq!(slots.first(Role::Model), None);
    }
}
