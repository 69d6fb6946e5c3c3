use crate::error::{LedgerReportError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the administration (tenant/entity) a record was booked in.
pub type AdministrationId = String;

/// Balance-sheet / P&L classification of a general ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Activa,
    Passiva,
    Kosten,
    Opbrengsten,
}

impl AccountType {
    pub const ALL: [AccountType; 4] = [
        AccountType::Activa,
        AccountType::Passiva,
        AccountType::Kosten,
        AccountType::Opbrengsten,
    ];

    /// Parses the `Type_rekening` value of an export line. Anything outside the four
    /// known names yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Activa => "Activa",
            AccountType::Passiva => "Passiva",
            AccountType::Kosten => "Kosten",
            AccountType::Opbrengsten => "Opbrengsten",
        }
    }

    pub fn is_balance_sheet(&self) -> bool {
        matches!(self, AccountType::Activa | AccountType::Passiva)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a record counts as positive when netting debit against credit.
///
/// - `DebitPositive`: `debit - credit`, the balance sheet view.
/// - `CreditPositive`: `credit - debit`, the P&L view.
///
/// Every aggregation that nets amounts takes one of these explicitly; picking the
/// wrong one silently inverts the reported sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetAmountConvention {
    CreditPositive,
    DebitPositive,
}

impl NetAmountConvention {
    pub fn apply(self, debit: f64, credit: f64) -> f64 {
        match self {
            NetAmountConvention::CreditPositive => credit - debit,
            NetAmountConvention::DebitPositive => debit - credit,
        }
    }
}

/// A calendar month in the accounting year, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(LedgerReportError::InvalidPeriod { year, month });
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = LedgerReportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LedgerReportError::InvalidMonthKey(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        MonthKey::new(year, month).map_err(|_| invalid())
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for MonthKey {
    type Error = LedgerReportError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Inclusive range of months requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRange {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

impl PeriodRange {
    pub fn new(start_year: i32, start_month: u32, end_year: i32, end_month: u32) -> Result<Self> {
        let range = Self {
            start_year,
            start_month,
            end_year,
            end_month,
        };
        range.validate()?;
        Ok(range)
    }

    pub fn from_keys(start: MonthKey, end: MonthKey) -> Result<Self> {
        Self::new(start.year(), start.month(), end.year(), end.month())
    }

    pub fn validate(&self) -> Result<()> {
        let start = self.start()?;
        let end = self.end()?;
        if end < start {
            return Err(LedgerReportError::InvalidPeriodRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(())
    }

    pub fn start(&self) -> Result<MonthKey> {
        MonthKey::new(self.start_year, self.start_month)
    }

    pub fn end(&self) -> Result<MonthKey> {
        MonthKey::new(self.end_year, self.end_month)
    }

    /// True when `key` falls inside the range. An invalid range contains nothing.
    pub fn contains(&self, key: MonthKey) -> bool {
        match (self.start(), self.end()) {
            (Ok(start), Ok(end)) => start <= key && key <= end,
            _ => false,
        }
    }
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}:{}-{:02}",
            self.start_year, self.start_month, self.end_year, self.end_month
        )
    }
}

/// One normalized general ledger line.
///
/// Produced by [`crate::ingestion::normalize_records`]; amounts are always present and
/// finite, and `period` is always a valid month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub year: i32,
    pub period: u32,
    pub booking_date: Option<NaiveDate>,
    pub account_number: String,
    #[serde(rename = "accountTypeName")]
    pub account_type: Option<AccountType>,
    pub account_characteristic: String,
    pub category_level2: String,
    pub category_level3: String,
    /// Generic `Categorie` field, used when `category_level3` is empty.
    pub category: String,
    pub debit_amount: f64,
    pub credit_amount: f64,
    pub document_number: String,
    pub administration_id: AdministrationId,
}

impl TransactionRecord {
    /// Creates a bare record for the given period. The remaining fields start empty
    /// and can be filled with the `with_*` methods.
    #[must_use]
    pub fn new(
        year: i32,
        period: u32,
        account_type: Option<AccountType>,
        debit_amount: f64,
        credit_amount: f64,
    ) -> Self {
        Self {
            year,
            period,
            booking_date: None,
            account_number: String::new(),
            account_type,
            account_characteristic: String::new(),
            category_level2: String::new(),
            category_level3: String::new(),
            category: String::new(),
            debit_amount,
            credit_amount,
            document_number: String::new(),
            administration_id: String::new(),
        }
    }

    #[must_use]
    pub fn with_account(mut self, number: impl Into<String>, name: impl Into<String>) -> Self {
        self.account_number = number.into();
        self.category_level2 = name.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category_level3: impl Into<String>) -> Self {
        self.category_level3 = category_level3.into();
        self
    }

    #[must_use]
    pub fn with_characteristic(mut self, characteristic: impl Into<String>) -> Self {
        self.account_characteristic = characteristic.into();
        self
    }

    #[must_use]
    pub fn with_document(mut self, document_number: impl Into<String>) -> Self {
        self.document_number = document_number.into();
        self
    }

    #[must_use]
    pub fn with_administration(mut self, administration_id: impl Into<String>) -> Self {
        self.administration_id = administration_id.into();
        self
    }

    #[must_use]
    pub fn with_booking_date(mut self, date: NaiveDate) -> Self {
        self.booking_date = Some(date);
        self
    }

    /// The accounting month of the record. `year`/`period` are authoritative over
    /// `booking_date`.
    pub fn month_key(&self) -> MonthKey {
        MonthKey {
            year: self.year,
            month: self.period,
        }
    }

    /// Records built by hand can carry a period outside 1..=12; those belong to no month.
    pub fn has_valid_period(&self) -> bool {
        (1..=12).contains(&self.period)
    }

    pub fn net_amount(&self, convention: NetAmountConvention) -> f64 {
        convention.apply(self.debit_amount, self.credit_amount)
    }

    pub fn is_type(&self, account_type: AccountType) -> bool {
        self.account_type == Some(account_type)
    }

    /// Strictly before `key`; a record in `key` itself is not before it.
    pub fn is_before(&self, key: MonthKey) -> bool {
        self.month_key() < key
    }
}

/// Running debit/credit totals for a group of records. `net_amount` is P&L style
/// (`credit - debit`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub total_debit: f64,
    pub total_credit: f64,
    pub net_amount: f64,
    pub record_count: usize,
}

impl Breakdown {
    pub fn add(&mut self, record: &TransactionRecord) {
        self.total_debit += record.debit_amount;
        self.total_credit += record.credit_amount;
        self.net_amount += record.net_amount(NetAmountConvention::CreditPositive);
        self.record_count += 1;
    }
}
