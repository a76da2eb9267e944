use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub tick: u64,
    pub label: String,
}

/// Ordered record of every runtime transition, stamped with the fixed tick it
/// happened on. Entries are mirrored to the `log` facade at debug level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<EventLogEntry>,
    #[serde(skip)]
    tick: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn push(&mut self, label: impl Into<String>) {
        let label = label.into();
        log::debug!("[{:>6}] {}", self.tick, label);
        self.events.push(EventLogEntry {
            tick: self.tick,
            label,
        });
    }

    pub fn entries(&self) -> &[EventLogEntry] {
        &self.events
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|entry| entry.label.as_str())
    }

    pub fn count(&self, label: &str) -> usize {
        self.labels().filter(|entry| *entry == label).count()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels().any(|entry| entry == label)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels().position(|entry| entry == label)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
