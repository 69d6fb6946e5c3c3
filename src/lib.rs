//! # Ledger Reports
//!
//! Turns flat general ledger lines (as exported from an AFAS administration) into
//! monthly financial reports: balance sheet, opening balance, an enhanced P&L driven by
//! a user-maintained category mapping, and an indirect cash flow statement.
//!
//! ## Core Concepts
//!
//! - **Transaction records**: one debit/credit line per account, normalized once at the
//!   ingestion boundary
//! - **Sign conventions**: every netting call names its convention, P&L style
//!   (`credit - debit`) or debit style (`debit - credit`)
//! - **Extra month**: reports are computed over the requested period plus the month
//!   before it, so month-over-month rows have a previous month to compare with
//! - **Category mapping**: free-form ledger categories are mapped onto a fixed set of
//!   enhanced P&L buckets; without a mapping those reports are unavailable, not zero
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledger_reports::*;
//!
//! let records = vec![
//!     TransactionRecord::new(2024, 1, Some(AccountType::Activa), 5000.0, 0.0)
//!         .with_category("Liquide middelen"),
//!     TransactionRecord::new(2024, 1, Some(AccountType::Opbrengsten), 0.0, 5000.0)
//!         .with_characteristic("Grootboekrekening")
//!         .with_category("Omzet"),
//! ];
//! let mapping = CategoryMapping::from_pairs([("Omzet", EnhancedBucket::Omzet)]);
//! let request = ReportRequest::from_json(
//!     r#"{"period": {"startYear": 2024, "startMonth": 1, "endYear": 2024, "endMonth": 1}}"#,
//! )
//! .unwrap();
//!
//! let report = process_financial_report(records.as_slice(), &mapping, &request).unwrap();
//! println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! ```

pub mod aggregator;
pub mod balance_sheet;
pub mod cash_flow;
pub mod category;
pub mod enhanced_pnl;
pub mod error;
pub mod health;
pub mod ingestion;
pub mod journal;
pub mod mapping;
pub mod opening_balance;
pub mod schema;
pub mod store;
pub mod utils;

pub use aggregator::{build_monthly_view, MonthBucket, MonthlyView};
pub use balance_sheet::{
    build_balance_hierarchy, AccountEntry, BalanceCheck, BalanceHierarchy, BalanceSheet,
    CategoryNode,
};
pub use cash_flow::{
    compute_cash_flow, BalanceGroups, CashFlowDeriver, CashFlowLine, CashFlowMonth,
    CashFlowReport,
};
pub use category::{resolve_category, FALLBACK_CATEGORY};
pub use enhanced_pnl::{
    compute_enhanced_pnl, EnhancedPnlEngine, EnhancedPnlMonth, EnhancedPnlReport, PnlLine,
    ReportRow, RowKind,
};
pub use error::{LedgerReportError, Result};
pub use health::{assess_health, HealthInputs, HealthReport};
pub use ingestion::*;
pub use journal::{group_journal_entries, JournalEntry};
pub use mapping::{CategoryMapping, CategoryMappingEntry, EnhancedBucket, MappedReport};
pub use opening_balance::{calculate_opening_balance, OpeningBalance};
pub use schema::*;
pub use store::{
    CategoryMappingProvider, InMemoryMappingStore, InMemoryRecordStore, RecordProvider,
};
pub use utils::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};

fn default_vpb_rate() -> f64 {
    enhanced_pnl::DEFAULT_VPB_RATE
}

fn default_balance_tolerance() -> f64 {
    balance_sheet::DEFAULT_BALANCE_TOLERANCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    /// Corporate income tax rate applied to a positive EBIT.
    #[serde(default = "default_vpb_rate")]
    pub vpb_rate: f64,
    /// Largest absolute balance or cash flow check still counted as balanced.
    #[serde(default = "default_balance_tolerance")]
    pub balance_tolerance: f64,
    /// Day count for DSO/DPO. Defaults to the calendar days of the requested period.
    #[serde(default)]
    pub days_in_period_basis: Option<u32>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            vpb_rate: default_vpb_rate(),
            balance_tolerance: default_balance_tolerance(),
            days_in_period_basis: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub period: PeriodRange,
    /// Selected administrations. Empty selects all of them.
    #[serde(default)]
    pub administrations: Vec<AdministrationId>,
    #[serde(default)]
    pub settings: ReportSettings,
}

impl ReportRequest {
    pub fn new(period: PeriodRange) -> Self {
        Self {
            period,
            administrations: Vec::new(),
            settings: ReportSettings::default(),
        }
    }

    #[must_use]
    pub fn with_administrations(mut self, administrations: Vec<AdministrationId>) -> Self {
        self.administrations = administrations;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.period.validate()?;
        validate_setting("vpbRate", self.settings.vpb_rate)?;
        validate_setting("balanceTolerance", self.settings.balance_tolerance)?;
        if self.settings.days_in_period_basis == Some(0) {
            return Err(LedgerReportError::InvalidSetting {
                name: "daysInPeriodBasis".to_string(),
                details: "must be at least one day".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_setting(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerReportError::InvalidSetting {
            name: name.to_string(),
            details: format!("expected a finite non-negative number, got {}", value),
        });
    }
    Ok(())
}

/// Everything shown for one reporting run. The leading extra month is used for the
/// calculations but never appears in the output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub period: PeriodRange,
    pub extended_period: PeriodRange,
    pub administrations: Vec<AdministrationId>,
    /// Displayed months that have at least one record.
    pub months: Vec<MonthKey>,
    pub monthly_data: Vec<MonthBucket>,
    pub opening_balance: Option<OpeningBalance>,
    pub balance_hierarchy: BalanceHierarchy,
    pub balance_check_total: BalanceCheck,
    pub enhanced_pnl: MappedReport<EnhancedPnlReport>,
    pub cash_flow: MappedReport<CashFlowReport>,
    pub journal_entries: Vec<JournalEntry>,
    pub health: HealthReport,
}

pub struct FinancialReportProcessor;

impl FinancialReportProcessor {
    pub fn process<R, M>(
        records: &R,
        mappings: &M,
        request: &ReportRequest,
    ) -> Result<FinancialReport>
    where
        R: RecordProvider + ?Sized,
        M: CategoryMappingProvider + ?Sized,
    {
        request.validate()?;

        let period = request.period;
        let settings = &request.settings;
        let all_records = records.records(&request.administrations)?;
        let mapping = mappings.mapping()?;

        info!(
            "Building financial report for {} ({} administrations selected, {} records)",
            period,
            request.administrations.len(),
            all_records.len()
        );

        let extended_period = extend_period_by_one_month(&period)?;
        let windowed: Vec<TransactionRecord> = all_records
            .iter()
            .filter(|r| r.has_valid_period() && extended_period.contains(r.month_key()))
            .cloned()
            .collect();
        debug!(
            "{} records fall inside the extended window {}",
            windowed.len(),
            extended_period
        );

        let view = build_monthly_view(&windowed, &period);
        let opening_balance = calculate_opening_balance(&all_records, period.start()?);

        let displayed: Vec<TransactionRecord> = windowed
            .iter()
            .filter(|r| period.contains(r.month_key()))
            .cloned()
            .collect();
        let balance_sheet = BalanceSheet::new(&displayed).with_tolerance(settings.balance_tolerance);

        let enhanced_pnl = EnhancedPnlEngine::new(&mapping)
            .with_vpb_rate(settings.vpb_rate)
            .compute(&view.monthly_data)
            .map(|report| report.restrict_to(&period));
        let cash_flow = CashFlowDeriver::new(&mapping)
            .with_vpb_rate(settings.vpb_rate)
            .with_tolerance(settings.balance_tolerance)
            .compute(&view.monthly_data)
            .map(|report| report.restrict_to(&period));

        let journal_entries = group_journal_entries(&displayed, settings.balance_tolerance);
        let days_basis = match settings.days_in_period_basis {
            Some(days) => f64::from(days),
            None => days_in_period(&period)? as f64,
        };
        let health = assess_health(&HealthInputs {
            balance_sheet: &balance_sheet,
            journal: &journal_entries,
            enhanced_pnl: &enhanced_pnl,
            cash_flow: &cash_flow,
            days_basis,
            tolerance: settings.balance_tolerance,
        });

        if !health.is_healthy() {
            debug!(
                "Report for {} has {} unbalanced months, {} failing cash flow checks, {} unbalanced documents",
                period,
                health.unbalanced_months.len(),
                health.cash_flow_check_failures.len(),
                health.unbalanced_documents.len()
            );
        }

        let balance_check_total = balance_sheet.balance_check_total();
        let monthly_data: Vec<MonthBucket> = view.displayed_months().cloned().collect();

        Ok(FinancialReport {
            period,
            extended_period,
            administrations: request.administrations.clone(),
            months: monthly_data.iter().map(|b| b.key).collect(),
            monthly_data,
            opening_balance,
            balance_hierarchy: balance_sheet.into_hierarchy(),
            balance_check_total,
            enhanced_pnl,
            cash_flow,
            journal_entries,
            health,
        })
    }
}

pub fn process_financial_report<R, M>(
    records: &R,
    mappings: &M,
    request: &ReportRequest,
) -> Result<FinancialReport>
where
    R: RecordProvider + ?Sized,
    M: CategoryMappingProvider + ?Sized,
{
    FinancialReportProcessor::process(records, mappings, request)
}
