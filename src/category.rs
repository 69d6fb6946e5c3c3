//! Category resolution and the category subsets used by the balance sheet and the
//! cash flow statement.

use crate::schema::TransactionRecord;

pub const FALLBACK_CATEGORY: &str = "Overige";

const RECEIVABLES: &str = "Debiteuren";
const PAYABLES: &str = "Crediteuren";
const GENERAL_LEDGER: &str = "Grootboekrekening";

/// Human readable category of a record.
///
/// Order: `category_level3`, then the generic `category` field, then the account
/// characteristic (`Debiteuren`/`Crediteuren` verbatim, `Grootboekrekening` as
/// `Overige`, anything else verbatim), then `Overige`.
pub fn resolve_category(record: &TransactionRecord) -> String {
    let level3 = record.category_level3.trim();
    if !level3.is_empty() {
        return level3.to_string();
    }

    let generic = record.category.trim();
    if !generic.is_empty() {
        return generic.to_string();
    }

    match record.account_characteristic.trim() {
        c @ (RECEIVABLES | PAYABLES) => c.to_string(),
        GENERAL_LEDGER => FALLBACK_CATEGORY.to_string(),
        "" => FALLBACK_CATEGORY.to_string(),
        other => other.to_string(),
    }
}

pub fn is_general_ledger(record: &TransactionRecord) -> bool {
    record.account_characteristic.trim() == GENERAL_LEDGER
}

/// Debtor/creditor categories are shown as one line, without per-account rows.
pub fn is_receivable_payable_bucket(category: &str) -> bool {
    let lower = category.to_lowercase();
    lower.contains("debiteur") || lower.contains("crediteur")
}

/// Subsets of balance-sheet categories the cash flow statement nets separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryGroup {
    /// Cash and bank (`liquid`).
    LiquidAssets,
    /// Fixed assets (`vaste activa`).
    FixedAssets,
    /// Equity (`eigen vermogen`).
    Equity,
}

impl CategoryGroup {
    fn needle(self) -> &'static str {
        match self {
            CategoryGroup::LiquidAssets => "liquid",
            CategoryGroup::FixedAssets => "vaste activa",
            CategoryGroup::Equity => "eigen vermogen",
        }
    }

    pub fn matches(self, category: &str) -> bool {
        category.to_lowercase().contains(self.needle())
    }
}
