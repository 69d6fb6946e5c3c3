//! The "Enhanced P&L": ledger categories rolled up through the category mapping into a
//! fixed chain of line items and subtotals, down to the result after tax.

use crate::aggregator::MonthBucket;
use crate::category::resolve_category;
use crate::mapping::{CategoryMapping, EnhancedBucket, MappedReport};
use crate::schema::{MonthKey, PeriodRange};
use crate::utils::{finite_or_zero, safe_percentage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat corporate income tax (VPB) provision, applied only to a positive EBIT.
pub const DEFAULT_VPB_RATE: f64 = 0.23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowKind {
    Line,
    Subtotal,
    Tax,
    Result,
    Percentage,
    Check,
}

/// Rows of the enhanced P&L in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnlLine {
    Omzet,
    InkoopwaardeOmzet,
    Provisies,
    PersoneelskostenDirect,
    Marge,
    MargePct,
    Autokosten,
    Marketingkosten,
    OperationelePersoneelskosten,
    Contributiemarge,
    ContributiemargePct,
    Huisvestingskosten,
    Kantoorkosten,
    AlgemeneKosten,
    Ebitda,
    EbitdaVsMargePct,
    Afschrijvingskosten,
    Financieringskosten,
    Ebit,
    Vpb,
    ResultaatNaBelasting,
    NettoResultaatPct,
}

impl PnlLine {
    pub const ALL: [PnlLine; 22] = [
        PnlLine::Omzet,
        PnlLine::InkoopwaardeOmzet,
        PnlLine::Provisies,
        PnlLine::PersoneelskostenDirect,
        PnlLine::Marge,
        PnlLine::MargePct,
        PnlLine::Autokosten,
        PnlLine::Marketingkosten,
        PnlLine::OperationelePersoneelskosten,
        PnlLine::Contributiemarge,
        PnlLine::ContributiemargePct,
        PnlLine::Huisvestingskosten,
        PnlLine::Kantoorkosten,
        PnlLine::AlgemeneKosten,
        PnlLine::Ebitda,
        PnlLine::EbitdaVsMargePct,
        PnlLine::Afschrijvingskosten,
        PnlLine::Financieringskosten,
        PnlLine::Ebit,
        PnlLine::Vpb,
        PnlLine::ResultaatNaBelasting,
        PnlLine::NettoResultaatPct,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PnlLine::Omzet => "Omzet",
            PnlLine::InkoopwaardeOmzet => "Inkoopwaarde omzet",
            PnlLine::Provisies => "Provisies",
            PnlLine::PersoneelskostenDirect => "Personeelskosten direct",
            PnlLine::Marge => "Marge",
            PnlLine::MargePct => "% Marge",
            PnlLine::Autokosten => "Autokosten",
            PnlLine::Marketingkosten => "Marketingkosten",
            PnlLine::OperationelePersoneelskosten => "Operationele personeelskosten",
            PnlLine::Contributiemarge => "Contributiemarge",
            PnlLine::ContributiemargePct => "% Contributiemarge",
            PnlLine::Huisvestingskosten => "Huisvestingskosten",
            PnlLine::Kantoorkosten => "Kantoorkosten",
            PnlLine::AlgemeneKosten => "Algemene kosten",
            PnlLine::Ebitda => "EBITDA",
            PnlLine::EbitdaVsMargePct => "EBITDA vs Marge %",
            PnlLine::Afschrijvingskosten => "Afschrijvingskosten",
            PnlLine::Financieringskosten => "Financieringskosten",
            PnlLine::Ebit => "EBIT",
            PnlLine::Vpb => "VPB (belasting)",
            PnlLine::ResultaatNaBelasting => "Resultaat na belasting",
            PnlLine::NettoResultaatPct => "Netto resultaat / omzet",
        }
    }

    pub fn kind(&self) -> RowKind {
        match self {
            PnlLine::Marge | PnlLine::Contributiemarge | PnlLine::Ebitda | PnlLine::Ebit => {
                RowKind::Subtotal
            }
            PnlLine::MargePct
            | PnlLine::ContributiemargePct
            | PnlLine::EbitdaVsMargePct
            | PnlLine::NettoResultaatPct => RowKind::Percentage,
            PnlLine::Vpb => RowKind::Tax,
            PnlLine::ResultaatNaBelasting => RowKind::Result,
            _ => RowKind::Line,
        }
    }
}

/// Every enhanced P&L figure for one month.
///
/// Cost lines hold `-|mapped amount|`; Omzet holds the mapped amount as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedPnlMonth {
    pub month: MonthKey,
    pub omzet: f64,
    pub inkoopwaarde_omzet: f64,
    pub provisies: f64,
    pub personeelskosten_direct: f64,
    pub marge: f64,
    pub autokosten: f64,
    pub marketingkosten: f64,
    pub operationele_personeelskosten: f64,
    pub contributiemarge: f64,
    pub huisvestingskosten: f64,
    pub kantoorkosten: f64,
    pub algemene_kosten: f64,
    pub ebitda: f64,
    pub afschrijvingskosten: f64,
    pub financieringskosten: f64,
    pub ebit: f64,
    pub vpb: f64,
    pub resultaat_na_belasting: f64,
    pub marge_pct: f64,
    pub contributiemarge_pct: f64,
    pub ebitda_vs_marge_pct: f64,
    pub netto_resultaat_pct: f64,
}

impl EnhancedPnlMonth {
    /// Runs the formula chain over the mapped amount of each bucket. Missing buckets
    /// count as 0.
    pub fn from_mapped_amounts(
        month: MonthKey,
        amounts: &BTreeMap<EnhancedBucket, f64>,
        vpb_rate: f64,
    ) -> Self {
        let mapped = |bucket: EnhancedBucket| {
            finite_or_zero(amounts.get(&bucket).copied().unwrap_or(0.0))
        };
        let cost = |bucket: EnhancedBucket| -mapped(bucket).abs();

        let omzet = mapped(EnhancedBucket::Omzet);
        let inkoopwaarde_omzet = cost(EnhancedBucket::InkoopwaardeOmzet);
        let provisies = cost(EnhancedBucket::Provisies);
        let personeelskosten_direct = cost(EnhancedBucket::PersoneelskostenDirect);
        let marge = omzet + inkoopwaarde_omzet + provisies + personeelskosten_direct;

        let autokosten = cost(EnhancedBucket::Autokosten);
        let marketingkosten = cost(EnhancedBucket::Marketingkosten);
        let operationele_personeelskosten = cost(EnhancedBucket::OperationelePersoneelskosten);
        let contributiemarge =
            marge + autokosten + marketingkosten + operationele_personeelskosten;

        let huisvestingskosten = cost(EnhancedBucket::Huisvestingskosten);
        let kantoorkosten = cost(EnhancedBucket::Kantoorkosten);
        let algemene_kosten = cost(EnhancedBucket::AlgemeneKosten);
        let ebitda = contributiemarge + huisvestingskosten + kantoorkosten + algemene_kosten;

        let afschrijvingskosten = cost(EnhancedBucket::Afschrijvingskosten);
        let financieringskosten = cost(EnhancedBucket::Financieringskosten);
        let ebit = ebitda + afschrijvingskosten + financieringskosten;

        let vpb = if ebit > 0.0 { -(ebit * vpb_rate) } else { 0.0 };
        let resultaat_na_belasting = ebit + vpb;

        Self {
            month,
            omzet,
            inkoopwaarde_omzet,
            provisies,
            personeelskosten_direct,
            marge,
            autokosten,
            marketingkosten,
            operationele_personeelskosten,
            contributiemarge,
            huisvestingskosten,
            kantoorkosten,
            algemene_kosten,
            ebitda,
            afschrijvingskosten,
            financieringskosten,
            ebit,
            vpb,
            resultaat_na_belasting,
            marge_pct: safe_percentage(marge, omzet),
            contributiemarge_pct: safe_percentage(contributiemarge, omzet),
            ebitda_vs_marge_pct: safe_percentage(ebitda, omzet),
            netto_resultaat_pct: safe_percentage(resultaat_na_belasting, omzet),
        }
    }

    pub fn value(&self, line: PnlLine) -> f64 {
        match line {
            PnlLine::Omzet => self.omzet,
            PnlLine::InkoopwaardeOmzet => self.inkoopwaarde_omzet,
            PnlLine::Provisies => self.provisies,
            PnlLine::PersoneelskostenDirect => self.personeelskosten_direct,
            PnlLine::Marge => self.marge,
            PnlLine::MargePct => self.marge_pct,
            PnlLine::Autokosten => self.autokosten,
            PnlLine::Marketingkosten => self.marketingkosten,
            PnlLine::OperationelePersoneelskosten => self.operationele_personeelskosten,
            PnlLine::Contributiemarge => self.contributiemarge,
            PnlLine::ContributiemargePct => self.contributiemarge_pct,
            PnlLine::Huisvestingskosten => self.huisvestingskosten,
            PnlLine::Kantoorkosten => self.kantoorkosten,
            PnlLine::AlgemeneKosten => self.algemene_kosten,
            PnlLine::Ebitda => self.ebitda,
            PnlLine::EbitdaVsMargePct => self.ebitda_vs_marge_pct,
            PnlLine::Afschrijvingskosten => self.afschrijvingskosten,
            PnlLine::Financieringskosten => self.financieringskosten,
            PnlLine::Ebit => self.ebit,
            PnlLine::Vpb => self.vpb,
            PnlLine::ResultaatNaBelasting => self.resultaat_na_belasting,
            PnlLine::NettoResultaatPct => self.netto_resultaat_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub label: String,
    pub kind: RowKind,
    pub per_month_amount: Vec<f64>,
    pub total: f64,
    pub is_computed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedPnlReport {
    pub months: Vec<MonthKey>,
    pub per_month: Vec<EnhancedPnlMonth>,
    pub rows: Vec<ReportRow>,
}

impl EnhancedPnlReport {
    pub fn from_months(per_month: Vec<EnhancedPnlMonth>) -> Self {
        let months = per_month.iter().map(|m| m.month).collect();
        let rows = build_rows(&per_month);
        Self {
            months,
            per_month,
            rows,
        }
    }

    pub fn row(&self, label: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn line(&self, line: PnlLine) -> Option<&ReportRow> {
        self.row(line.label())
    }

    pub fn month(&self, key: MonthKey) -> Option<&EnhancedPnlMonth> {
        self.per_month.iter().find(|m| m.month == key)
    }

    /// Keeps only the months inside `period`; totals are rebuilt from what remains.
    pub fn restrict_to(&self, period: &PeriodRange) -> Self {
        Self::from_months(
            self.per_month
                .iter()
                .filter(|m| period.contains(m.month))
                .cloned()
                .collect(),
        )
    }
}

/// Every row, percentage rows included, totals to the sum of its monthly values.
fn build_rows(per_month: &[EnhancedPnlMonth]) -> Vec<ReportRow> {
    PnlLine::ALL
        .iter()
        .map(|line| {
            let per_month_amount: Vec<f64> = per_month.iter().map(|m| m.value(*line)).collect();
            let total = per_month_amount.iter().sum();
            ReportRow {
                label: line.label().to_string(),
                kind: line.kind(),
                per_month_amount,
                total,
                is_computed: line.kind() != RowKind::Line,
            }
        })
        .collect()
}

pub struct EnhancedPnlEngine<'a> {
    mapping: &'a CategoryMapping,
    vpb_rate: f64,
}

impl<'a> EnhancedPnlEngine<'a> {
    pub fn new(mapping: &'a CategoryMapping) -> Self {
        Self {
            mapping,
            vpb_rate: DEFAULT_VPB_RATE,
        }
    }

    #[must_use]
    pub fn with_vpb_rate(mut self, vpb_rate: f64) -> Self {
        self.vpb_rate = vpb_rate;
        self
    }

    /// Per target bucket, the records whose category maps onto it, netted with the
    /// bucket's sign rule. Unmapped categories are left out.
    pub fn mapped_amounts(&self, bucket: &MonthBucket) -> BTreeMap<EnhancedBucket, f64> {
        let mut amounts: BTreeMap<EnhancedBucket, f64> = BTreeMap::new();
        for record in &bucket.records {
            if let Some(target) = self.mapping.bucket_for(&resolve_category(record)) {
                *amounts.entry(target).or_insert(0.0) += record.net_amount(target.convention());
            }
        }
        amounts
    }

    pub fn compute_month(&self, bucket: &MonthBucket) -> EnhancedPnlMonth {
        EnhancedPnlMonth::from_mapped_amounts(
            bucket.key,
            &self.mapped_amounts(bucket),
            self.vpb_rate,
        )
    }

    pub fn compute(&self, monthly_data: &[MonthBucket]) -> MappedReport<EnhancedPnlReport> {
        if self.mapping.is_empty() {
            debug!("No category mapping available, enhanced P&L not computed");
            return MappedReport::MappingUnavailable;
        }

        let per_month = monthly_data.iter().map(|b| self.compute_month(b)).collect();
        MappedReport::Available(EnhancedPnlReport::from_months(per_month))
    }
}

pub fn compute_enhanced_pnl(
    monthly_data: &[MonthBucket],
    mapping: &CategoryMapping,
) -> MappedReport<EnhancedPnlReport> {
    EnhancedPnlEngine::new(mapping).compute(monthly_data)
}
