use std::collections::HashMap;

use crate::record::CanonicalRecord;

/// Records keyed by (declared product, declared source). A repeated key replaces the
/// earlier record in place, so iteration order is first-insertion order.
#[derive(Debug, Default)]
pub struct AggregateTable {
    records: Vec<CanonicalRecord>,
    index: HashMap<(String, String), usize>,
}

impl AggregateTable {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record that was replaced, if any.
    pub fn insert(&mut self, record: CanonicalRecord) -> Option<CanonicalRecord> {
        let key = record.key();
        match self.index.get(&key) {
            Some(&slot) => Some(std::mem::replace(&mut self.records[slot], record)),
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, product: &str, source: &str) -> Option<&CanonicalRecord> {
        self.index
            .get(&(product.to_string(), source.to_string()))
            .map(|&slot| &self.records[slot])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    /// One record per (product, source) pair.
    pub fn iter(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}
