use crate::category::resolve_category;
use crate::schema::{
    AccountType, Breakdown, MonthKey, NetAmountConvention, PeriodRange, TransactionRecord,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All records of one accounting month with their running totals.
///
/// `net_amount` and the breakdown net amounts are P&L style (`credit - debit`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    pub key: MonthKey,
    pub year: i32,
    pub month: u32,
    pub records: Vec<TransactionRecord>,
    pub total_debit: f64,
    pub total_credit: f64,
    pub net_amount: f64,
    pub category_breakdown: BTreeMap<String, Breakdown>,
    pub account_type_breakdown: BTreeMap<AccountType, Breakdown>,
}

impl MonthBucket {
    fn new(key: MonthKey) -> Self {
        Self {
            key,
            year: key.year(),
            month: key.month(),
            records: Vec::new(),
            total_debit: 0.0,
            total_credit: 0.0,
            net_amount: 0.0,
            category_breakdown: BTreeMap::new(),
            account_type_breakdown: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &TransactionRecord, category: String) {
        self.total_debit += record.debit_amount;
        self.total_credit += record.credit_amount;
        self.net_amount += record.net_amount(NetAmountConvention::CreditPositive);
        self.category_breakdown
            .entry(category)
            .or_default()
            .add(record);
        if let Some(account_type) = record.account_type {
            self.account_type_breakdown
                .entry(account_type)
                .or_default()
                .add(record);
        }
        self.records.push(record.clone());
    }

    /// Net amount of the records accepted by `filter`, in the given convention.
    pub fn net_amount_where<F>(&self, convention: NetAmountConvention, filter: F) -> f64
    where
        F: Fn(&TransactionRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|r| filter(r))
            .map(|r| r.net_amount(convention))
            .sum()
    }
}

/// Records grouped per month, in ascending `(year, month)` order, plus totals over the
/// whole supplied record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyView {
    /// The months meant for display. Buckets outside it (the leading extra month)
    /// stay available for month-over-month calculations.
    pub period: PeriodRange,
    pub monthly_data: Vec<MonthBucket>,
    pub all_records: Vec<TransactionRecord>,
    pub category_totals: BTreeMap<String, Breakdown>,
    pub account_type_totals: BTreeMap<AccountType, Breakdown>,
}

impl MonthlyView {
    pub fn month(&self, key: MonthKey) -> Option<&MonthBucket> {
        self.monthly_data
            .binary_search_by(|b| b.key.cmp(&key))
            .ok()
            .map(|idx| &self.monthly_data[idx])
    }

    /// The bucket preceding `key` in the view, if any.
    pub fn previous_month(&self, key: MonthKey) -> Option<&MonthBucket> {
        let idx = self.monthly_data.binary_search_by(|b| b.key.cmp(&key)).ok()?;
        idx.checked_sub(1).map(|prev| &self.monthly_data[prev])
    }

    pub fn displayed_months(&self) -> impl Iterator<Item = &MonthBucket> + '_ {
        self.monthly_data
            .iter()
            .filter(move |b| self.period.contains(b.key))
    }

    pub fn month_keys(&self) -> Vec<MonthKey> {
        self.monthly_data.iter().map(|b| b.key).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.monthly_data.is_empty()
    }
}

/// Groups `records` into month buckets in a single pass.
///
/// Records with a period outside 1..=12 are left out of every bucket and total.
/// The input is not modified; callers pre-filter administrations and the (extended)
/// window before calling.
pub fn build_monthly_view(records: &[TransactionRecord], period: &PeriodRange) -> MonthlyView {
    let mut buckets: BTreeMap<MonthKey, MonthBucket> = BTreeMap::new();
    let mut category_totals: BTreeMap<String, Breakdown> = BTreeMap::new();
    let mut account_type_totals: BTreeMap<AccountType, Breakdown> = BTreeMap::new();
    let mut all_records = Vec::with_capacity(records.len());

    for record in records {
        if !record.has_valid_period() {
            debug!(
                "Record for account {} has period {} outside 1..=12, leaving it out",
                record.account_number, record.period
            );
            continue;
        }

        let category = resolve_category(record);
        category_totals
            .entry(category.clone())
            .or_default()
            .add(record);
        if let Some(account_type) = record.account_type {
            account_type_totals
                .entry(account_type)
                .or_default()
                .add(record);
        }

        let key = record.month_key();
        buckets
            .entry(key)
            .or_insert_with(|| MonthBucket::new(key))
            .add(record, category);
        all_records.push(record.clone());
    }

    debug!(
        "Built monthly view with {} months from {} records",
        buckets.len(),
        all_records.len()
    );

    MonthlyView {
        period: *period,
        monthly_data: buckets.into_values().collect(),
        all_records,
        category_totals,
        account_type_totals,
    }
}
