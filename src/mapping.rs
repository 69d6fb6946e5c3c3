use crate::error::{LedgerReportError, Result};
use crate::schema::NetAmountConvention;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The fixed line items of the enhanced P&L a ledger category can be mapped onto.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum EnhancedBucket {
    #[serde(rename = "Omzet")]
    Omzet,
    #[serde(rename = "Inkoopwaarde omzet")]
    InkoopwaardeOmzet,
    #[serde(rename = "Provisies")]
    Provisies,
    #[serde(rename = "Personeelskosten direct")]
    PersoneelskostenDirect,
    #[serde(rename = "Autokosten")]
    Autokosten,
    #[serde(rename = "Marketingkosten")]
    Marketingkosten,
    #[serde(rename = "Operationele personeelskosten")]
    OperationelePersoneelskosten,
    #[serde(rename = "Huisvestingskosten")]
    Huisvestingskosten,
    #[serde(rename = "Kantoorkosten")]
    Kantoorkosten,
    #[serde(rename = "Algemene kosten")]
    AlgemeneKosten,
    #[serde(rename = "Afschrijvingskosten")]
    Afschrijvingskosten,
    #[serde(rename = "Financieringskosten")]
    Financieringskosten,
}

impl EnhancedBucket {
    pub const ALL: [EnhancedBucket; 12] = [
        EnhancedBucket::Omzet,
        EnhancedBucket::InkoopwaardeOmzet,
        EnhancedBucket::Provisies,
        EnhancedBucket::PersoneelskostenDirect,
        EnhancedBucket::Autokosten,
        EnhancedBucket::Marketingkosten,
        EnhancedBucket::OperationelePersoneelskosten,
        EnhancedBucket::Huisvestingskosten,
        EnhancedBucket::Kantoorkosten,
        EnhancedBucket::AlgemeneKosten,
        EnhancedBucket::Afschrijvingskosten,
        EnhancedBucket::Financieringskosten,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EnhancedBucket::Omzet => "Omzet",
            EnhancedBucket::InkoopwaardeOmzet => "Inkoopwaarde omzet",
            EnhancedBucket::Provisies => "Provisies",
            EnhancedBucket::PersoneelskostenDirect => "Personeelskosten direct",
            EnhancedBucket::Autokosten => "Autokosten",
            EnhancedBucket::Marketingkosten => "Marketingkosten",
            EnhancedBucket::OperationelePersoneelskosten => "Operationele personeelskosten",
            EnhancedBucket::Huisvestingskosten => "Huisvestingskosten",
            EnhancedBucket::Kantoorkosten => "Kantoorkosten",
            EnhancedBucket::AlgemeneKosten => "Algemene kosten",
            EnhancedBucket::Afschrijvingskosten => "Afschrijvingskosten",
            EnhancedBucket::Financieringskosten => "Financieringskosten",
        }
    }

    /// Omzet and Provisies are read credit-positive, every cost bucket debit-positive.
    pub fn convention(&self) -> NetAmountConvention {
        match self {
            EnhancedBucket::Omzet | EnhancedBucket::Provisies => {
                NetAmountConvention::CreditPositive
            }
            _ => NetAmountConvention::DebitPositive,
        }
    }
}

impl fmt::Display for EnhancedBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnhancedBucket {
    type Err = LedgerReportError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| LedgerReportError::UnknownBucket(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMappingEntry {
    #[schemars(description = "Ledger category (Omschrijving_3) as resolved from the records")]
    pub category: String,
    #[schemars(description = "Enhanced P&L line the category rolls up into")]
    pub bucket: EnhancedBucket,
    #[serde(default)]
    #[schemars(
        description = "True once a user confirmed or overrode the mapping. Suggestions never replace a verified entry."
    )]
    pub verified: bool,
}

/// User-maintained dictionary from ledger category to enhanced P&L bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMapping {
    entries: BTreeMap<String, CategoryMappingEntry>,
}

impl CategoryMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a verified mapping from `(category, bucket)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, EnhancedBucket)>,
        S: Into<String>,
    {
        let mut mapping = Self::new();
        for (category, bucket) in pairs {
            mapping.verify(category, bucket);
        }
        mapping
    }

    /// Parses a JSON object of `category -> bucket label`, as stored by the
    /// persistence layer.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut mapping = Self::new();
        for (category, label) in raw {
            let bucket: EnhancedBucket = label.parse()?;
            mapping.verify(category, bucket);
        }
        Ok(mapping)
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CategoryMappingEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.category.trim().to_string(), e))
                .collect(),
        }
    }

    /// Records a suggested mapping. Returns `false` and leaves the mapping untouched
    /// when the category already has a verified entry.
    pub fn suggest(&mut self, category: impl Into<String>, bucket: EnhancedBucket) -> bool {
        let category = category.into().trim().to_string();
        if self.entries.get(&category).is_some_and(|e| e.verified) {
            return false;
        }
        self.entries.insert(
            category.clone(),
            CategoryMappingEntry {
                category,
                bucket,
                verified: false,
            },
        );
        true
    }

    /// Records a user-confirmed mapping, replacing any previous entry.
    pub fn verify(&mut self, category: impl Into<String>, bucket: EnhancedBucket) {
        let category = category.into().trim().to_string();
        self.entries.insert(
            category.clone(),
            CategoryMappingEntry {
                category,
                bucket,
                verified: true,
            },
        );
    }

    pub fn remove(&mut self, category: &str) -> Option<CategoryMappingEntry> {
        self.entries.remove(category.trim())
    }

    pub fn bucket_for(&self, category: &str) -> Option<EnhancedBucket> {
        self.entries.get(category.trim()).map(|e| e.bucket)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CategoryMappingEntry> {
        self.entries.values()
    }

    pub fn categories_for(&self, bucket: EnhancedBucket) -> Vec<&str> {
        self.entries
            .values()
            .filter(|e| e.bucket == bucket)
            .map(|e| e.category.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Result of a report that depends on the category mapping. Without any mapping the
/// report is unavailable, which is not the same as a report full of zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "report", rename_all = "camelCase")]
pub enum MappedReport<T> {
    MappingUnavailable,
    Available(T),
}

impl<T> MappedReport<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, MappedReport::Available(_))
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            MappedReport::Available(report) => Some(report),
            MappedReport::MappingUnavailable => None,
        }
    }

    pub fn into_available(self) -> Option<T> {
        match self {
            MappedReport::Available(report) => Some(report),
            MappedReport::MappingUnavailable => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> MappedReport<U> {
        match self {
            MappedReport::Available(report) => MappedReport::Available(f(report)),
            MappedReport::MappingUnavailable => MappedReport::MappingUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_labels_round_trip() {
        for bucket in EnhancedBucket::ALL {
            assert_eq!(bucket.label().parse::<EnhancedBucket>().unwrap(), bucket);
        }
        assert!("Belastingen".parse::<EnhancedBucket>().is_err());
    }

    #[test]
    fn test_bucket_sign_rules() {
        assert_eq!(
            EnhancedBucket::Omzet.convention(),
            NetAmountConvention::CreditPositive
        );
        assert_eq!(
            EnhancedBucket::Provisies.convention(),
            NetAmountConvention::CreditPositive
        );
        assert_eq!(
            EnhancedBucket::Kantoorkosten.convention(),
            NetAmountConvention::DebitPositive
        );
    }

    #[test]
    fn test_suggestion_never_overrides_verified() {
        let mut mapping = CategoryMapping::new();
        assert!(mapping.suggest("Reclame", EnhancedBucket::AlgemeneKosten));
        assert_eq!(
            mapping.bucket_for("Reclame"),
            Some(EnhancedBucket::AlgemeneKosten)
        );

        mapping.verify("Reclame", EnhancedBucket::Marketingkosten);
        assert!(!mapping.suggest("Reclame", EnhancedBucket::AlgemeneKosten));
        assert_eq!(
            mapping.bucket_for(" Reclame "),
            Some(EnhancedBucket::Marketingkosten)
        );
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_from_json() {
        let mapping =
            CategoryMapping::from_json(r#"{"Omzet hoog": "Omzet", "Huur": "Huisvestingskosten"}"#)
                .unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.bucket_for("Huur"), Some(EnhancedBucket::Huisvestingskosten));
        assert_eq!(mapping.categories_for(EnhancedBucket::Omzet), vec!["Omzet hoog"]);

        assert!(CategoryMapping::from_json(r#"{"Huur": "Rent"}"#).is_err());
    }

    #[test]
    fn test_mapped_report_serialization() {
        let unavailable: MappedReport<u32> = MappedReport::MappingUnavailable;
        let json = serde_json::to_string(&unavailable).unwrap();
        assert_eq!(json, r#"{"status":"mappingUnavailable"}"#);

        let available = MappedReport::Available(7u32);
        assert_eq!(available.available(), Some(&7));
        assert!(available.is_available());
    }
}
