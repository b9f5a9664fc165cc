//! Signal store
//!
//! The persistence collaborator for the DBC model: holds saved signal
//! definitions, assigns identities, derives the per-CAN-ID message view and
//! supports bulk JSON export/import.

use std::collections::BTreeMap;

use crate::signal::{normalize_can_id, Message, Signal};
use crate::types::{DiagError, Result};

/// In-memory signal store
///
/// Signals are keyed by a store-assigned numeric id; the message grouping
/// is derived on read, never stored.
pub struct SignalStore {
    signals: Vec<Signal>,
    next_id: u32,
}

impl SignalStore {
    pub fn new() -> Self {
        Self {
            signals: Vec::new(),
            next_id: 1,
        }
    }

    /// Add a signal, assigning its identity
    ///
    /// The definition is validated and the name must be unique within its
    /// CAN ID's signal set. Returns the assigned id.
    pub fn add(&mut self, mut signal: Signal) -> Result<u32> {
        signal.validate()?;
        signal.can_id = normalize_can_id(&signal.can_id);

        if self
            .signals
            .iter()
            .any(|s| s.can_id == signal.can_id && s.name == signal.name)
        {
            return Err(DiagError::InvalidSignal(format!(
                "signal '{}' already exists for CAN ID {}",
                signal.name, signal.can_id
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        signal.id = Some(id);
        log::info!("Stored signal '{}' ({}) as id {}", signal.name, signal.can_id, id);
        self.signals.push(signal);
        Ok(id)
    }

    /// Remove a signal by id, returning it if present
    pub fn remove(&mut self, id: u32) -> Option<Signal> {
        let pos = self.signals.iter().position(|s| s.id == Some(id))?;
        let removed = self.signals.remove(pos);
        log::info!("Removed signal '{}' (id {})", removed.name, id);
        Some(removed)
    }

    /// Look up a signal by id
    pub fn get(&self, id: u32) -> Option<&Signal> {
        self.signals.iter().find(|s| s.id == Some(id))
    }

    /// All signals of one CAN identifier
    pub fn signals_for(&self, can_id: &str) -> Vec<&Signal> {
        let can_id = normalize_can_id(can_id);
        self.signals.iter().filter(|s| s.can_id == can_id).collect()
    }

    /// Find a signal by CAN ID and name
    pub fn find(&self, can_id: &str, name: &str) -> Option<&Signal> {
        let can_id = normalize_can_id(can_id);
        self.signals
            .iter()
            .find(|s| s.can_id == can_id && s.name == name)
    }

    /// Derived message view: signals grouped by CAN ID, sorted by ID
    pub fn messages(&self) -> Vec<Message> {
        let mut grouped: BTreeMap<String, Vec<Signal>> = BTreeMap::new();
        for signal in &self.signals {
            grouped
                .entry(signal.can_id.clone())
                .or_default()
                .push(signal.clone());
        }
        grouped
            .into_iter()
            .map(|(can_id, signals)| Message { can_id, signals })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Store statistics
    pub fn stats(&self) -> StoreStats {
        let num_messages = self
            .signals
            .iter()
            .map(|s| s.can_id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        StoreStats {
            num_messages,
            num_signals: self.signals.len(),
        }
    }

    /// Bulk export of all signal records as JSON
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.signals)?)
    }

    /// Bulk import of signal records from JSON, replacing the store
    ///
    /// Identities are reassigned; duplicate name/CAN-ID pairs and invalid
    /// definitions are rejected as a whole.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let records: Vec<Signal> = serde_json::from_str(json)?;

        let mut fresh = SignalStore::new();
        for mut record in records {
            record.id = None;
            fresh.add(record)?;
        }

        let imported = fresh.len();
        *self = fresh;
        log::info!("Imported {} signal(s)", imported);
        Ok(imported)
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Distinct CAN identifiers with at least one signal
    pub num_messages: usize,
    /// Total signal definitions
    pub num_signals: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ByteOrder;

    fn speed_signal() -> Signal {
        Signal::new("0x1a0", "VehicleSpeed")
            .with_position(7, 16)
            .with_byte_order(ByteOrder::BigEndian)
            .with_scaling(0.01, 0.0)
            .with_unit("km/h")
    }

    #[test]
    fn test_add_assigns_ids_and_normalizes() {
        let mut store = SignalStore::new();
        let id = store.add(speed_signal()).unwrap();
        assert_eq!(id, 1);

        let stored = store.get(id).unwrap();
        assert_eq!(stored.can_id, "1A0");
        assert_eq!(stored.id, Some(1));

        let id2 = store.add(Signal::new("2B4", "Rpm")).unwrap();
        assert_eq!(id2, 2);
        assert_eq!(store.stats(), StoreStats { num_messages: 2, num_signals: 2 });
    }

    #[test]
    fn test_duplicate_name_within_can_id_rejected() {
        let mut store = SignalStore::new();
        store.add(speed_signal()).unwrap();
        assert!(matches!(
            store.add(speed_signal()),
            Err(DiagError::InvalidSignal(_))
        ));

        // Same name under a different CAN ID is fine
        let mut other = speed_signal();
        other.can_id = "2B4".to_string();
        store.add(other).unwrap();
    }

    #[test]
    fn test_remove_by_id() {
        let mut store = SignalStore::new();
        let id = store.add(speed_signal()).unwrap();
        assert!(store.remove(id).is_some());
        assert!(store.remove(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_messages_grouping() {
        let mut store = SignalStore::new();
        store.add(Signal::new("2B4", "Rpm").with_position(0, 16)).unwrap();
        store.add(speed_signal()).unwrap();
        store.add(Signal::new("1A0", "Odometer").with_position(32, 24)).unwrap();

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].can_id, "1A0");
        assert_eq!(messages[0].signals.len(), 2);
        assert_eq!(messages[1].can_id, "2B4");
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut store = SignalStore::new();
        store.add(speed_signal()).unwrap();
        store.add(Signal::new("2B4", "Rpm").with_position(0, 16)).unwrap();

        let json = store.export_json().unwrap();

        let mut restored = SignalStore::new();
        assert_eq!(restored.import_json(&json).unwrap(), 2);
        assert_eq!(restored.stats(), store.stats());
        let speed = restored.find("1A0", "VehicleSpeed").unwrap();
        assert_eq!(speed.byte_order, ByteOrder::BigEndian);
        assert_eq!(speed.scale, 0.01);
    }

    #[test]
    fn test_import_rejects_invalid_definition() {
        let mut store = SignalStore::new();
        store.add(speed_signal()).unwrap();

        // length 0 is invalid; the store must be left untouched
        let json = r#"[{
            "can_id": "1A0", "name": "Broken", "start_bit": 0, "length": 0,
            "byte_order": "little_endian", "is_signed": false,
            "scale": 1.0, "offset": 0.0, "min_val": 0.0, "max_val": 0.0
        }]"#;
        assert!(store.import_json(json).is_err());
        assert_eq!(store.len(), 1);
    }
}
