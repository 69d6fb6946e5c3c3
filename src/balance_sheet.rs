use crate::category::{is_general_ledger, is_receivable_payable_bucket, resolve_category};
use crate::schema::{AccountType, MonthKey, NetAmountConvention, TransactionRecord};
use crate::utils::within_tolerance;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_BALANCE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntry {
    pub name: String,
    pub account_number: String,
    /// Debit-style net amount over all supplied records.
    pub total_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    /// Keyed by `"{category_level2}|{account_number}"`. Always empty for debtor and
    /// creditor categories.
    pub accounts: BTreeMap<String, AccountEntry>,
    pub is_receivable_payable_bucket: bool,
    /// Debit style sum of the accounts. Debtor and creditor categories carry the
    /// P&L style category total instead, as [`BalanceSheet::category_total_amount`].
    pub total_amount: f64,
}

/// Activa/Passiva → category → account.
pub type BalanceHierarchy = BTreeMap<AccountType, BTreeMap<String, CategoryNode>>;

/// The balance identity for one month (or for all months when `month` is `None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    pub month: Option<MonthKey>,
    /// Activa + Passiva, debit style.
    pub balance_difference: f64,
    /// Opbrengsten − |Kosten|, P&L style, general ledger accounts only.
    pub wv_result: f64,
    /// |balance_difference| − |wv_result|
    pub check: f64,
    pub is_balanced: bool,
}

pub fn account_key(account_name: &str, account_number: &str) -> String {
    format!("{}|{}", account_name, account_number)
}

/// Builds the Activa/Passiva hierarchy. Records of any other (or no) account type are
/// left out entirely.
pub fn build_balance_hierarchy(records: &[TransactionRecord]) -> BalanceHierarchy {
    let mut hierarchy: BalanceHierarchy = BTreeMap::new();

    for record in records.iter().filter(|r| r.has_valid_period()) {
        let Some(account_type) = record.account_type.filter(|t| t.is_balance_sheet()) else {
            continue;
        };

        let category = resolve_category(record);
        let is_bucket = is_receivable_payable_bucket(&category);
        let node = hierarchy
            .entry(account_type)
            .or_default()
            .entry(category)
            .or_insert_with(|| CategoryNode {
                is_receivable_payable_bucket: is_bucket,
                ..Default::default()
            });

        if is_bucket {
            node.total_amount += record.net_amount(NetAmountConvention::CreditPositive);
            continue;
        }

        node.accounts
            .entry(account_key(&record.category_level2, &record.account_number))
            .or_insert_with(|| AccountEntry {
                name: record.category_level2.clone(),
                account_number: record.account_number.clone(),
                total_amount: 0.0,
            })
            .total_amount += record.net_amount(NetAmountConvention::DebitPositive);
    }

    for categories in hierarchy.values_mut() {
        for node in categories.values_mut() {
            if !node.is_receivable_payable_bucket {
                node.total_amount = node.accounts.values().map(|a| a.total_amount).sum();
            }
        }
    }

    hierarchy
}

/// Balance sheet over a borrowed record set, with the per-month accessors the report
/// rows are drawn from.
///
/// Account and type amounts are debit style. Category amounts default to P&L style,
/// which is how the category "TOTAAL" rows are displayed; use
/// [`BalanceSheet::category_amount_with`] to pick the convention explicitly.
pub struct BalanceSheet<'a> {
    records: &'a [TransactionRecord],
    hierarchy: BalanceHierarchy,
    tolerance: f64,
}

impl<'a> BalanceSheet<'a> {
    pub fn new(records: &'a [TransactionRecord]) -> Self {
        Self {
            records,
            hierarchy: build_balance_hierarchy(records),
            tolerance: DEFAULT_BALANCE_TOLERANCE,
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn records(&self) -> &'a [TransactionRecord] {
        self.records
    }

    pub fn hierarchy(&self) -> &BalanceHierarchy {
        &self.hierarchy
    }

    pub fn into_hierarchy(self) -> BalanceHierarchy {
        self.hierarchy
    }

    /// Months that have at least one record, ascending.
    pub fn months(&self) -> Vec<MonthKey> {
        self.records
            .iter()
            .filter(|r| r.has_valid_period())
            .map(|r| r.month_key())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn sum<F>(&self, month: Option<MonthKey>, convention: NetAmountConvention, filter: F) -> f64
    where
        F: Fn(&TransactionRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|r| r.has_valid_period())
            .filter(|r| month.map_or(true, |m| r.month_key() == m))
            .filter(|r| filter(r))
            .map(|r| r.net_amount(convention))
            .sum()
    }

    fn is_account(record: &TransactionRecord, account_number: &str, account_name: &str) -> bool {
        record.account_number == account_number && record.category_level2 == account_name
    }

    pub fn account_amount_for_month(
        &self,
        month: MonthKey,
        account_number: &str,
        account_name: &str,
    ) -> f64 {
        self.sum(Some(month), NetAmountConvention::DebitPositive, |r| {
            Self::is_account(r, account_number, account_name)
        })
    }

    pub fn account_total_amount(&self, account_number: &str, account_name: &str) -> f64 {
        self.sum(None, NetAmountConvention::DebitPositive, |r| {
            Self::is_account(r, account_number, account_name)
        })
    }

    pub fn category_amount_with(
        &self,
        month: Option<MonthKey>,
        account_type: AccountType,
        category: &str,
        convention: NetAmountConvention,
    ) -> f64 {
        self.sum(month, convention, |r| {
            r.is_type(account_type) && resolve_category(r) == category
        })
    }

    /// P&L style (`credit - debit`), unlike the account rows below the category.
    pub fn category_amount_for_month(
        &self,
        month: MonthKey,
        account_type: AccountType,
        category: &str,
    ) -> f64 {
        self.category_amount_with(
            Some(month),
            account_type,
            category,
            NetAmountConvention::CreditPositive,
        )
    }

    pub fn category_total_amount(&self, account_type: AccountType, category: &str) -> f64 {
        self.category_amount_with(None, account_type, category, NetAmountConvention::CreditPositive)
    }

    pub fn type_total_for_month(&self, month: MonthKey, account_type: AccountType) -> f64 {
        self.sum(Some(month), NetAmountConvention::DebitPositive, |r| {
            r.is_type(account_type)
        })
    }

    pub fn type_total(&self, account_type: AccountType) -> f64 {
        self.sum(None, NetAmountConvention::DebitPositive, |r| {
            r.is_type(account_type)
        })
    }

    fn difference(&self, month: Option<MonthKey>) -> f64 {
        self.sum(month, NetAmountConvention::DebitPositive, |r| {
            r.account_type.is_some_and(|t| t.is_balance_sheet())
        })
    }

    fn wv(&self, month: Option<MonthKey>) -> f64 {
        let revenue = self.sum(month, NetAmountConvention::CreditPositive, |r| {
            r.is_type(AccountType::Opbrengsten) && is_general_ledger(r)
        });
        let costs = self.sum(month, NetAmountConvention::CreditPositive, |r| {
            r.is_type(AccountType::Kosten) && is_general_ledger(r)
        });
        revenue - costs.abs()
    }

    fn check(&self, month: Option<MonthKey>) -> BalanceCheck {
        let balance_difference = self.difference(month);
        let wv_result = self.wv(month);
        let check = balance_difference.abs() - wv_result.abs();
        BalanceCheck {
            month,
            balance_difference,
            wv_result,
            check,
            is_balanced: within_tolerance(check, self.tolerance),
        }
    }

    pub fn balance_difference(&self, month: MonthKey) -> f64 {
        self.difference(Some(month))
    }

    pub fn wv_result(&self, month: MonthKey) -> f64 {
        self.wv(Some(month))
    }

    pub fn balance_check(&self, month: MonthKey) -> BalanceCheck {
        self.check(Some(month))
    }

    pub fn balance_difference_total(&self) -> f64 {
        self.difference(None)
    }

    pub fn wv_result_total(&self) -> f64 {
        self.wv(None)
    }

    pub fn balance_check_total(&self) -> BalanceCheck {
        self.check(None)
    }

    /// One check per month with records, logging the months that do not balance.
    pub fn balance_checks(&self) -> Vec<BalanceCheck> {
        let checks: Vec<BalanceCheck> = self
            .months()
            .into_iter()
            .map(|m| self.balance_check(m))
            .collect();

        for check in checks.iter().filter(|c| !c.is_balanced) {
            if let Some(month) = check.month {
                warn!(
                    "Balance check failed for {}: difference {:.2}, W&V {:.2}, check {:.2}",
                    month, check.balance_difference, check.wv_result, check.check
                );
            }
        }

        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan() -> MonthKey {
        MonthKey::new(2024, 1).unwrap()
    }

    fn ledger(record: TransactionRecord) -> TransactionRecord {
        record.with_characteristic("Grootboekrekening")
    }

    fn balanced_records() -> Vec<TransactionRecord> {
        vec![
            ledger(
                TransactionRecord::new(2024, 1, Some(AccountType::Activa), 5000.0, 0.0)
                    .with_account("1100", "Bank")
                    .with_category("Liquide middelen"),
            ),
            ledger(
                TransactionRecord::new(2024, 1, Some(AccountType::Opbrengsten), 0.0, 5000.0)
                    .with_account("8000", "Omzet hoog")
                    .with_category("Omzet"),
            ),
            ledger(
                TransactionRecord::new(2024, 1, Some(AccountType::Kosten), 1200.0, 0.0)
                    .with_account("4300", "Huur")
                    .with_category("Huisvestingskosten"),
            ),
            TransactionRecord::new(2024, 1, Some(AccountType::Passiva), 0.0, 1200.0)
                .with_account("1600", "Crediteur A")
                .with_characteristic("Crediteuren"),
        ]
    }

    #[test]
    fn test_hierarchy_structure() {
        let records = balanced_records();
        let hierarchy = build_balance_hierarchy(&records);

        assert_eq!(hierarchy.len(), 2);
        let liquid = &hierarchy[&AccountType::Activa]["Liquide middelen"];
        assert!(!liquid.is_receivable_payable_bucket);
        assert_eq!(liquid.accounts["Bank|1100"].total_amount, 5000.0);
        assert_eq!(liquid.total_amount, 5000.0);

        let creditors = &hierarchy[&AccountType::Passiva]["Crediteuren"];
        assert!(creditors.is_receivable_payable_bucket);
        assert!(creditors.accounts.is_empty());
        assert_eq!(creditors.total_amount, 1200.0);
        assert_eq!(
            creditors.total_amount,
            BalanceSheet::new(&records).category_total_amount(AccountType::Passiva, "Crediteuren")
        );
    }

    #[test]
    fn test_receivable_bucket_never_breaks_down() {
        let records: Vec<TransactionRecord> = (0..5)
            .map(|i| {
                TransactionRecord::new(2024, 1, Some(AccountType::Activa), 100.0, 0.0)
                    .with_account(format!("13{:02}", i), format!("Debiteur {}", i))
                    .with_category("Debiteuren binnenland")
            })
            .collect();

        let hierarchy = build_balance_hierarchy(&records);
        let node = &hierarchy[&AccountType::Activa]["Debiteuren binnenland"];
        assert!(node.is_receivable_payable_bucket);
        assert!(node.accounts.is_empty());
        assert_eq!(node.total_amount, -500.0);
    }

    #[test]
    fn test_non_balance_types_are_excluded() {
        let records = vec![
            TransactionRecord::new(2024, 1, Some(AccountType::Kosten), 10.0, 0.0),
            TransactionRecord::new(2024, 1, None, 10.0, 0.0),
        ];
        assert!(build_balance_hierarchy(&records).is_empty());
    }

    #[test]
    fn test_account_and_category_sign_conventions_differ() {
        let records = balanced_records();
        let sheet = BalanceSheet::new(&records);

        assert_eq!(sheet.account_amount_for_month(jan(), "1100", "Bank"), 5000.0);
        assert_eq!(sheet.account_total_amount("1100", "Bank"), 5000.0);
        assert_eq!(
            sheet.category_amount_for_month(jan(), AccountType::Activa, "Liquide middelen"),
            -5000.0
        );
        assert_eq!(
            sheet.category_amount_with(
                Some(jan()),
                AccountType::Activa,
                "Liquide middelen",
                NetAmountConvention::DebitPositive
            ),
            5000.0
        );
        assert_eq!(sheet.type_total(AccountType::Activa), 5000.0);
        assert_eq!(sheet.type_total_for_month(jan(), AccountType::Passiva), -1200.0);
    }

    #[test]
    fn test_balance_identity_holds_for_balanced_books() {
        let records = balanced_records();
        let sheet = BalanceSheet::new(&records);

        let check = sheet.balance_check(jan());
        assert_eq!(check.balance_difference, 3800.0);
        assert_eq!(check.wv_result, 3800.0);
        assert!(check.check.abs() < 0.01);
        assert!(check.is_balanced);
        assert!(sheet.balance_check_total().is_balanced);
    }

    #[test]
    fn test_unbalanced_books_are_flagged() {
        let mut records = balanced_records();
        records.push(
            TransactionRecord::new(2024, 1, Some(AccountType::Activa), 250.0, 0.0)
                .with_category("Voorraden"),
        );
        let sheet = BalanceSheet::new(&records);

        let check = sheet.balance_check(jan());
        assert!((check.check - 250.0).abs() < 1e-9);
        assert!(!check.is_balanced);

        let checks = sheet.balance_checks();
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].is_balanced);
    }

    #[test]
    fn test_wv_only_counts_general_ledger_accounts() {
        let records = vec![
            TransactionRecord::new(2024, 1, Some(AccountType::Opbrengsten), 0.0, 100.0)
                .with_characteristic("Debiteuren"),
        ];
        let sheet = BalanceSheet::new(&records);
        assert_eq!(sheet.wv_result(jan()), 0.0);
    }
}
