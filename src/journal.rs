use crate::schema::{MonthKey, TransactionRecord};
use crate::utils::within_tolerance;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// All lines booked under one document number (Boekstuknummer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub document_number: String,
    pub line_count: usize,
    pub total_debit: f64,
    pub total_credit: f64,
    pub months: Vec<MonthKey>,
    /// Debit and credit agree within the tolerance used for grouping.
    pub is_balanced: bool,
}

impl JournalEntry {
    pub fn difference(&self) -> f64 {
        self.total_debit - self.total_credit
    }
}

/// Groups records into journal entries by document number, sorted by document number.
/// Lines without a document number are not part of any entry.
pub fn group_journal_entries(records: &[TransactionRecord], tolerance: f64) -> Vec<JournalEntry> {
    let mut grouped: BTreeMap<&str, (usize, f64, f64, BTreeSet<MonthKey>)> = BTreeMap::new();

    for record in records.iter().filter(|r| r.has_valid_period()) {
        let document = record.document_number.trim();
        if document.is_empty() {
            continue;
        }
        let entry = grouped.entry(document).or_default();
        entry.0 += 1;
        entry.1 += record.debit_amount;
        entry.2 += record.credit_amount;
        entry.3.insert(record.month_key());
    }

    grouped
        .into_iter()
        .map(|(document, (line_count, total_debit, total_credit, months))| JournalEntry {
            document_number: document.to_string(),
            line_count,
            total_debit,
            total_credit,
            months: months.into_iter().collect(),
            is_balanced: within_tolerance(total_debit - total_credit, tolerance),
        })
        .collect()
}

/// Entries whose debit and credit totals differ beyond the grouping tolerance.
pub fn unbalanced_entries(entries: &[JournalEntry]) -> Vec<&JournalEntry> {
    entries.iter().filter(|e| !e.is_balanced).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AccountType;

    #[test]
    fn test_grouping_and_balance_flag() {
        let records = vec![
            TransactionRecord::new(2024, 1, Some(AccountType::Activa), 121.0, 0.0)
                .with_document("24001"),
            TransactionRecord::new(2024, 1, Some(AccountType::Opbrengsten), 0.0, 100.0)
                .with_document("24001"),
            TransactionRecord::new(2024, 1, Some(AccountType::Passiva), 0.0, 21.0)
                .with_document("24001"),
            TransactionRecord::new(2024, 2, Some(AccountType::Kosten), 50.0, 0.0)
                .with_document("24002"),
            TransactionRecord::new(2024, 2, Some(AccountType::Kosten), 75.0, 0.0),
        ];

        let entries = group_journal_entries(&records, 0.01);
        assert_eq!(entries.len(), 2);

        let sale = &entries[0];
        assert_eq!(sale.document_number, "24001");
        assert_eq!(sale.line_count, 3);
        assert!(sale.is_balanced);
        assert_eq!(sale.months, vec![MonthKey::new(2024, 1).unwrap()]);

        let half_booked = &entries[1];
        assert!(!half_booked.is_balanced);
        assert_eq!(half_booked.difference(), 50.0);

        let unbalanced = unbalanced_entries(&entries);
        assert_eq!(unbalanced.len(), 1);
        assert_eq!(unbalanced[0].document_number, "24002");
    }
}
