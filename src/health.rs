//! Financial health checks over a computed report: the balance and cash flow checks,
//! unbalanced journal entries, and collection/payment cycle metrics.

use crate::balance_sheet::{BalanceCheck, BalanceSheet};
use crate::cash_flow::CashFlowReport;
use crate::category::resolve_category;
use crate::enhanced_pnl::{EnhancedPnlReport, PnlLine};
use crate::journal::{unbalanced_entries, JournalEntry};
use crate::mapping::MappedReport;
use crate::schema::{AccountType, MonthKey, NetAmountConvention};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub balance_checks: Vec<BalanceCheck>,
    pub unbalanced_months: Vec<MonthKey>,
    pub cash_flow_check_failures: Vec<MonthKey>,
    pub unbalanced_documents: Vec<String>,
    /// Days Sales Outstanding. `None` without Omzet or without a mapping.
    pub dso_days: Option<f64>,
    /// Days Payable Outstanding. `None` without purchase costs or without a mapping.
    pub dpo_days: Option<f64>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.unbalanced_months.is_empty()
            && self.cash_flow_check_failures.is_empty()
            && self.unbalanced_documents.is_empty()
    }
}

pub struct HealthInputs<'a, 'r> {
    pub balance_sheet: &'a BalanceSheet<'r>,
    pub journal: &'a [JournalEntry],
    pub enhanced_pnl: &'a MappedReport<EnhancedPnlReport>,
    pub cash_flow: &'a MappedReport<CashFlowReport>,
    /// Number of days the reported period covers, for DSO/DPO.
    pub days_basis: f64,
    pub tolerance: f64,
}

/// Debit-style sum of the debtor (Activa) or creditor (Passiva) categories.
fn receivable_payable_sum(sheet: &BalanceSheet<'_>, account_type: AccountType, needle: &str) -> f64 {
    sheet
        .records()
        .iter()
        .filter(|r| r.has_valid_period() && r.is_type(account_type))
        .filter(|r| resolve_category(r).to_lowercase().contains(needle))
        .map(|r| r.net_amount(NetAmountConvention::DebitPositive))
        .sum()
}

fn cycle_days(balance: f64, flow: f64, days_basis: f64) -> Option<f64> {
    if flow == 0.0 {
        return None;
    }
    let days = balance / flow * days_basis;
    days.is_finite().then_some(days)
}

pub fn assess_health(inputs: &HealthInputs<'_, '_>) -> HealthReport {
    let balance_checks = inputs.balance_sheet.balance_checks();
    let unbalanced_months = balance_checks
        .iter()
        .filter(|c| !c.is_balanced)
        .filter_map(|c| c.month)
        .collect();

    let cash_flow_check_failures = inputs
        .cash_flow
        .available()
        .map(|report| report.failing_checks(inputs.tolerance))
        .unwrap_or_default();

    let unbalanced_documents = unbalanced_entries(inputs.journal)
        .into_iter()
        .map(|e| e.document_number.clone())
        .collect();

    let (dso_days, dpo_days) = match inputs.enhanced_pnl.available() {
        Some(pnl) => {
            let total = |line: PnlLine| pnl.line(line).map(|r| r.total).unwrap_or(0.0);
            let receivables =
                receivable_payable_sum(inputs.balance_sheet, AccountType::Activa, "debiteur");
            let payables =
                receivable_payable_sum(inputs.balance_sheet, AccountType::Passiva, "crediteur");
            (
                cycle_days(receivables, total(PnlLine::Omzet), inputs.days_basis),
                cycle_days(
                    payables.abs(),
                    total(PnlLine::InkoopwaardeOmzet).abs(),
                    inputs.days_basis,
                ),
            )
        }
        None => (None, None),
    };

    HealthReport {
        balance_checks,
        unbalanced_months,
        cash_flow_check_failures,
        unbalanced_documents,
        dso_days,
        dpo_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::build_monthly_view;
    use crate::cash_flow::compute_cash_flow;
    use crate::enhanced_pnl::compute_enhanced_pnl;
    use crate::journal::group_journal_entries;
    use crate::mapping::{CategoryMapping, EnhancedBucket};
    use crate::schema::{PeriodRange, TransactionRecord};

    fn records() -> Vec<TransactionRecord> {
        vec![
            TransactionRecord::new(2024, 1, Some(AccountType::Activa), 3000.0, 0.0)
                .with_characteristic("Debiteuren")
                .with_document("V1"),
            TransactionRecord::new(2024, 1, Some(AccountType::Opbrengsten), 0.0, 3000.0)
                .with_characteristic("Grootboekrekening")
                .with_category("Omzet")
                .with_document("V1"),
            TransactionRecord::new(2024, 1, Some(AccountType::Kosten), 1000.0, 0.0)
                .with_characteristic("Grootboekrekening")
                .with_category("Inkoop")
                .with_document("I1"),
            TransactionRecord::new(2024, 1, Some(AccountType::Passiva), 0.0, 1000.0)
                .with_characteristic("Crediteuren")
                .with_document("I1"),
        ]
    }

    #[test]
    fn test_health_of_balanced_month() {
        let records = records();
        let period = PeriodRange::new(2024, 1, 2024, 1).unwrap();
        let view = build_monthly_view(&records, &period);
        let mapping = CategoryMapping::from_pairs([
            ("Omzet", EnhancedBucket::Omzet),
            ("Inkoop", EnhancedBucket::InkoopwaardeOmzet),
        ]);
        let pnl = compute_enhanced_pnl(&view.monthly_data, &mapping);
        let cash_flow = compute_cash_flow(&view.monthly_data, &mapping);
        let sheet = BalanceSheet::new(&records);
        let journal = group_journal_entries(&records, 0.01);

        let report = assess_health(&HealthInputs {
            balance_sheet: &sheet,
            journal: &journal,
            enhanced_pnl: &pnl,
            cash_flow: &cash_flow,
            days_basis: 31.0,
            tolerance: 0.01,
        });

        assert!(report.unbalanced_months.is_empty());
        assert!(report.unbalanced_documents.is_empty());
        assert_eq!(report.balance_checks.len(), 1);
        assert_eq!(report.dso_days, Some(31.0));
        assert_eq!(report.dpo_days, Some(31.0));
    }

    #[test]
    fn test_metrics_absent_without_mapping() {
        let records = records();
        let sheet = BalanceSheet::new(&records);
        let report = assess_health(&HealthInputs {
            balance_sheet: &sheet,
            journal: &[],
            enhanced_pnl: &MappedReport::MappingUnavailable,
            cash_flow: &MappedReport::MappingUnavailable,
            days_basis: 365.0,
            tolerance: 0.01,
        });
        assert_eq!(report.dso_days, None);
        assert_eq!(report.dpo_days, None);
        assert!(report.cash_flow_check_failures.is_empty());
    }

    #[test]
    fn test_unbalanced_document_makes_report_unhealthy() {
        let mut records = records();
        records.push(
            TransactionRecord::new(2024, 1, Some(AccountType::Kosten), 10.0, 0.0)
                .with_characteristic("Grootboekrekening")
                .with_document("X9"),
        );
        let sheet = BalanceSheet::new(&records);
        let journal = group_journal_entries(&records, 0.01);
        let report = assess_health(&HealthInputs {
            balance_sheet: &sheet,
            journal: &journal,
            enhanced_pnl: &MappedReport::MappingUnavailable,
            cash_flow: &MappedReport::MappingUnavailable,
            days_basis: 365.0,
            tolerance: 0.01,
        });
        assert_eq!(report.unbalanced_documents, vec!["X9".to_string()]);
        assert_eq!(report.unbalanced_months, vec![MonthKey::new(2024, 1).unwrap()]);
        assert!(!report.is_healthy());
    }
}
