//! Sources for ledger records and the category mapping.
//!
//! The report pipeline reads through these traits and never holds data of its own; the
//! caller owns whatever caching sits behind them.

use crate::error::Result;
use crate::ingestion::filter_by_administrations;
use crate::mapping::{CategoryMapping, EnhancedBucket};
use crate::schema::{AdministrationId, TransactionRecord};
use parking_lot::RwLock;

pub trait RecordProvider {
    /// Records of the given administrations. An empty selection means all of them.
    fn records(&self, administrations: &[AdministrationId]) -> Result<Vec<TransactionRecord>>;
}

pub trait CategoryMappingProvider {
    fn mapping(&self) -> Result<CategoryMapping>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Vec<TransactionRecord>,
}

impl InMemoryRecordStore {
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        Self { records }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = TransactionRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordProvider for InMemoryRecordStore {
    fn records(&self, administrations: &[AdministrationId]) -> Result<Vec<TransactionRecord>> {
        Ok(filter_by_administrations(&self.records, administrations))
    }
}

impl RecordProvider for [TransactionRecord] {
    fn records(&self, administrations: &[AdministrationId]) -> Result<Vec<TransactionRecord>> {
        Ok(filter_by_administrations(self, administrations))
    }
}

/// Shared mapping that can be edited while reports read from it.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    mapping: RwLock<CategoryMapping>,
}

impl InMemoryMappingStore {
    pub fn new(mapping: CategoryMapping) -> Self {
        Self {
            mapping: RwLock::new(mapping),
        }
    }

    /// Records a suggested bucket. Returns `false` when the category already has a
    /// verified bucket, which a suggestion never replaces.
    pub fn suggest(&self, category: impl Into<String>, bucket: EnhancedBucket) -> bool {
        self.mapping.write().suggest(category, bucket)
    }

    pub fn verify(&self, category: impl Into<String>, bucket: EnhancedBucket) {
        self.mapping.write().verify(category, bucket);
    }

    pub fn remove(&self, category: &str) -> bool {
        self.mapping.write().remove(category).is_some()
    }
}

impl CategoryMappingProvider for InMemoryMappingStore {
    fn mapping(&self) -> Result<CategoryMapping> {
        Ok(self.mapping.read().clone())
    }
}

impl CategoryMappingProvider for CategoryMapping {
    fn mapping(&self) -> Result<CategoryMapping> {
        Ok(self.clone())
    }
}
