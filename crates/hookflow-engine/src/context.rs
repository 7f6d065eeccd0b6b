use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use hookflow_core::types::{Item, TriggerInput};

/// Per-node outputs of one run, in the order nodes produced them.
#[derive(Debug, Clone, Default)]
pub struct ResultsMap {
    order: Vec<String>,
    entries: HashMap<String, Vec<Item>>,
}

impl ResultsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's output. Entries are written once; returns `false`
    /// and leaves the map untouched when `name` already has one.
    pub fn insert(&mut self, name: impl Into<String>, items: Vec<Item>) -> bool {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return false;
        }
        self.order.push(name.clone());
        self.entries.insert(name, items);
        true
    }

    pub fn get(&self, name: &str) -> Option<&[Item]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Item])> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|v| (name.as_str(), v.as_slice())))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl Serialize for ResultsMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (name, items) in self.iter() {
            map.serialize_entry(name, items)?;
        }
        map.end()
    }
}

/// State of a single workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub input: TriggerInput,
    pub results: ResultsMap,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(input: TriggerInput) -> Self {
        Self {
            input,
            results: ResultsMap::new(),
            started_at: Utc::now(),
        }
    }
}
