//! Indirect cash flow statement, derived from the enhanced P&L and the month-over-month
//! movement of balance-sheet category groups.

use crate::aggregator::MonthBucket;
use crate::balance_sheet::DEFAULT_BALANCE_TOLERANCE;
use crate::category::{resolve_category, CategoryGroup};
use crate::enhanced_pnl::{
    EnhancedPnlEngine, EnhancedPnlMonth, ReportRow, RowKind, DEFAULT_VPB_RATE,
};
use crate::mapping::{CategoryMapping, MappedReport};
use crate::schema::{
    AccountType, MonthKey, NetAmountConvention, PeriodRange, TransactionRecord,
};
use crate::utils::within_tolerance;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashFlowLine {
    ResultaatNaBelasting,
    Belastingen,
    Afschrijvingen,
    MutatieNettoWerkkapitaal,
    OperationeleKasstroom,
    Investeringen,
    Investeringskasstroom,
    Dividend,
    Financieringskasstroom,
    NettoKasstroom,
    MutatieLiquideMiddelen,
    Check,
}

impl CashFlowLine {
    pub const ALL: [CashFlowLine; 12] = [
        CashFlowLine::ResultaatNaBelasting,
        CashFlowLine::Belastingen,
        CashFlowLine::Afschrijvingen,
        CashFlowLine::MutatieNettoWerkkapitaal,
        CashFlowLine::OperationeleKasstroom,
        CashFlowLine::Investeringen,
        CashFlowLine::Investeringskasstroom,
        CashFlowLine::Dividend,
        CashFlowLine::Financieringskasstroom,
        CashFlowLine::NettoKasstroom,
        CashFlowLine::MutatieLiquideMiddelen,
        CashFlowLine::Check,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CashFlowLine::ResultaatNaBelasting => "Resultaat na belasting",
            CashFlowLine::Belastingen => "Belastingen",
            CashFlowLine::Afschrijvingen => "Afschrijvingen",
            CashFlowLine::MutatieNettoWerkkapitaal => "Mutatie netto werkkapitaal",
            CashFlowLine::OperationeleKasstroom => "Operationele kasstroom",
            CashFlowLine::Investeringen => "Investeringen",
            CashFlowLine::Investeringskasstroom => "Investeringskasstroom",
            CashFlowLine::Dividend => "Dividend",
            CashFlowLine::Financieringskasstroom => "Financieringskasstroom",
            CashFlowLine::NettoKasstroom => "Netto kasstroom",
            CashFlowLine::MutatieLiquideMiddelen => "Mutatie liquide middelen",
            CashFlowLine::Check => "Check",
        }
    }

    pub fn kind(&self) -> RowKind {
        match self {
            CashFlowLine::OperationeleKasstroom
            | CashFlowLine::Investeringskasstroom
            | CashFlowLine::Financieringskasstroom => RowKind::Subtotal,
            CashFlowLine::NettoKasstroom => RowKind::Result,
            CashFlowLine::Check => RowKind::Check,
            _ => RowKind::Line,
        }
    }
}

/// Debit-style balance-sheet movement of one month, split into the groups the cash flow
/// statement compares month over month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceGroups {
    /// Activa other than liquid and fixed assets.
    pub working_capital_activa: f64,
    /// Passiva other than equity.
    pub working_capital_passiva: f64,
    pub vaste_activa: f64,
    pub eigen_vermogen: f64,
    pub liquide_middelen: f64,
}

impl BalanceGroups {
    pub fn from_records<'r, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'r TransactionRecord>,
    {
        let mut groups = Self::default();
        for record in records {
            let amount = record.net_amount(NetAmountConvention::DebitPositive);
            let category = resolve_category(record);
            let is_liquid = CategoryGroup::LiquidAssets.matches(&category);
            let is_fixed = CategoryGroup::FixedAssets.matches(&category);
            let is_equity = CategoryGroup::Equity.matches(&category);

            match record.account_type {
                Some(AccountType::Activa) => {
                    if is_liquid {
                        groups.liquide_middelen += amount;
                    }
                    if is_fixed {
                        groups.vaste_activa += amount;
                    }
                    if !is_liquid && !is_fixed {
                        groups.working_capital_activa += amount;
                    }
                }
                Some(AccountType::Passiva) => {
                    if is_equity {
                        groups.eigen_vermogen += amount;
                    } else {
                        groups.working_capital_passiva += amount;
                    }
                }
                _ => {}
            }
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowMonth {
    pub month: MonthKey,
    /// False for the first month of the data; its delta rows are 0.
    pub has_previous_month: bool,
    pub resultaat_na_belasting: f64,
    pub belastingen: f64,
    pub afschrijvingen: f64,
    pub mutatie_netto_werkkapitaal: f64,
    pub operationele_kasstroom: f64,
    pub investeringen: f64,
    pub investeringskasstroom: f64,
    pub dividend: f64,
    pub financieringskasstroom: f64,
    pub netto_kasstroom: f64,
    pub mutatie_liquide_middelen: f64,
    pub check: f64,
}

impl CashFlowMonth {
    pub fn derive(
        pnl: &EnhancedPnlMonth,
        current: &BalanceGroups,
        previous: Option<&BalanceGroups>,
    ) -> Self {
        let resultaat_na_belasting = pnl.resultaat_na_belasting;
        let belastingen = -pnl.vpb;
        let afschrijvingen = pnl.afschrijvingskosten.abs();

        let (mutatie_netto_werkkapitaal, investeringen, dividend, mutatie_liquide_middelen) =
            match previous {
                Some(prev) => {
                    let activa_delta =
                        current.working_capital_activa - prev.working_capital_activa;
                    let passiva_delta =
                        current.working_capital_passiva - prev.working_capital_passiva;
                    (
                        -(activa_delta - passiva_delta),
                        -(prev.vaste_activa - afschrijvingen + current.vaste_activa),
                        -(current.eigen_vermogen - prev.eigen_vermogen - resultaat_na_belasting
                            + belastingen),
                        current.liquide_middelen - prev.liquide_middelen,
                    )
                }
                None => (0.0, 0.0, 0.0, 0.0),
            };

        let operationele_kasstroom =
            resultaat_na_belasting + belastingen + afschrijvingen + mutatie_netto_werkkapitaal;
        let investeringskasstroom = investeringen;
        let financieringskasstroom = dividend;
        let netto_kasstroom =
            operationele_kasstroom + investeringskasstroom + financieringskasstroom;

        Self {
            month: pnl.month,
            has_previous_month: previous.is_some(),
            resultaat_na_belasting,
            belastingen,
            afschrijvingen,
            mutatie_netto_werkkapitaal,
            operationele_kasstroom,
            investeringen,
            investeringskasstroom,
            dividend,
            financieringskasstroom,
            netto_kasstroom,
            mutatie_liquide_middelen,
            check: netto_kasstroom - mutatie_liquide_middelen,
        }
    }

    pub fn value(&self, line: CashFlowLine) -> f64 {
        match line {
            CashFlowLine::ResultaatNaBelasting => self.resultaat_na_belasting,
            CashFlowLine::Belastingen => self.belastingen,
            CashFlowLine::Afschrijvingen => self.afschrijvingen,
            CashFlowLine::MutatieNettoWerkkapitaal => self.mutatie_netto_werkkapitaal,
            CashFlowLine::OperationeleKasstroom => self.operationele_kasstroom,
            CashFlowLine::Investeringen => self.investeringen,
            CashFlowLine::Investeringskasstroom => self.investeringskasstroom,
            CashFlowLine::Dividend => self.dividend,
            CashFlowLine::Financieringskasstroom => self.financieringskasstroom,
            CashFlowLine::NettoKasstroom => self.netto_kasstroom,
            CashFlowLine::MutatieLiquideMiddelen => self.mutatie_liquide_middelen,
            CashFlowLine::Check => self.check,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowReport {
    pub months: Vec<MonthKey>,
    pub per_month: Vec<CashFlowMonth>,
    pub rows: Vec<ReportRow>,
}

impl CashFlowReport {
    pub fn from_months(per_month: Vec<CashFlowMonth>) -> Self {
        let months = per_month.iter().map(|m| m.month).collect();
        let rows = CashFlowLine::ALL
            .iter()
            .map(|line| {
                let per_month_amount: Vec<f64> =
                    per_month.iter().map(|m| m.value(*line)).collect();
                ReportRow {
                    label: line.label().to_string(),
                    kind: line.kind(),
                    total: per_month_amount.iter().sum(),
                    per_month_amount,
                    is_computed: line.kind() != RowKind::Line,
                }
            })
            .collect();
        Self {
            months,
            per_month,
            rows,
        }
    }

    pub fn row(&self, label: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn line(&self, line: CashFlowLine) -> Option<&ReportRow> {
        self.row(line.label())
    }

    pub fn month(&self, key: MonthKey) -> Option<&CashFlowMonth> {
        self.per_month.iter().find(|m| m.month == key)
    }

    /// Keeps only the months inside `period`. The retained months keep the deltas
    /// computed against their (possibly dropped) previous month.
    pub fn restrict_to(&self, period: &PeriodRange) -> Self {
        Self::from_months(
            self.per_month
                .iter()
                .filter(|m| period.contains(m.month))
                .cloned()
                .collect(),
        )
    }

    /// Months whose cash flow check is not within `tolerance` of 0.
    pub fn failing_checks(&self, tolerance: f64) -> Vec<MonthKey> {
        self.per_month
            .iter()
            .filter(|m| !within_tolerance(m.check, tolerance))
            .map(|m| m.month)
            .collect()
    }
}

pub struct CashFlowDeriver<'a> {
    pnl: EnhancedPnlEngine<'a>,
    mapping: &'a CategoryMapping,
    tolerance: f64,
}

impl<'a> CashFlowDeriver<'a> {
    pub fn new(mapping: &'a CategoryMapping) -> Self {
        Self {
            pnl: EnhancedPnlEngine::new(mapping),
            mapping,
            tolerance: DEFAULT_BALANCE_TOLERANCE,
        }
    }

    #[must_use]
    pub fn with_vpb_rate(mut self, vpb_rate: f64) -> Self {
        self.pnl = EnhancedPnlEngine::new(self.mapping).with_vpb_rate(vpb_rate);
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// `monthly_data` must be in ascending month order, as produced by
    /// [`crate::aggregator::build_monthly_view`]. Each month is compared with the bucket
    /// before it; the first bucket has no previous month.
    pub fn compute(&self, monthly_data: &[MonthBucket]) -> MappedReport<CashFlowReport> {
        if self.mapping.is_empty() {
            debug!("No category mapping available, cash flow not computed");
            return MappedReport::MappingUnavailable;
        }

        let groups: Vec<BalanceGroups> = monthly_data
            .iter()
            .map(|b| BalanceGroups::from_records(&b.records))
            .collect();

        let per_month: Vec<CashFlowMonth> = monthly_data
            .iter()
            .enumerate()
            .map(|(idx, bucket)| {
                let pnl = self.pnl.compute_month(bucket);
                let previous = idx.checked_sub(1).map(|prev| &groups[prev]);
                CashFlowMonth::derive(&pnl, &groups[idx], previous)
            })
            .collect();

        let report = CashFlowReport::from_months(per_month);
        for month in report.failing_checks(self.tolerance) {
            warn!("Cash flow check failed for {}", month);
        }

        MappedReport::Available(report)
    }
}

pub fn compute_cash_flow(
    monthly_data: &[MonthBucket],
    mapping: &CategoryMapping,
) -> MappedReport<CashFlowReport> {
    CashFlowDeriver::new(mapping)
        .with_vpb_rate(DEFAULT_VPB_RATE)
        .compute(monthly_data)
}
