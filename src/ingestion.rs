//! Normalization of raw AFAS export lines into [`TransactionRecord`]s.
//!
//! The export is loosely typed: codes arrive as numbers or strings, amounts may be
//! missing and the accounting period may be absent. Everything is resolved here once,
//! so the aggregation modules can rely on well-typed input.

use crate::error::Result;
use crate::schema::{AccountType, AdministrationId, TransactionRecord};
use crate::utils::finite_or_zero;
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawTransactionRecord {
    #[serde(rename = "Jaar", alias = "year", default, deserialize_with = "de_opt_i64")]
    #[schemars(description = "Accounting year")]
    pub year: Option<i64>,

    #[serde(rename = "Periode", alias = "period", default, deserialize_with = "de_opt_i64")]
    #[schemars(description = "Accounting period (month 1-12). Authoritative over Boekdatum.")]
    pub period: Option<i64>,

    #[serde(rename = "Boekdatum", alias = "bookingDate", default, deserialize_with = "de_opt_string")]
    #[schemars(description = "Booking date, YYYY-MM-DD (a time suffix is ignored)")]
    pub booking_date: Option<String>,

    #[serde(rename = "Rekeningnummer", alias = "accountNumber", default, deserialize_with = "de_opt_string")]
    pub account_number: Option<String>,

    #[serde(rename = "Type_rekening", alias = "accountTypeName", default, deserialize_with = "de_opt_string")]
    #[schemars(description = "One of Activa, Passiva, Kosten, Opbrengsten")]
    pub account_type_name: Option<String>,

    #[serde(rename = "Kenmerk_rekening", alias = "accountCharacteristic", default, deserialize_with = "de_opt_string")]
    #[schemars(description = "Account classifier, e.g. Grootboekrekening, Debiteuren, Crediteuren")]
    pub account_characteristic: Option<String>,

    #[serde(rename = "Omschrijving_2", alias = "categoryLevel2", default, deserialize_with = "de_opt_string")]
    #[schemars(description = "Account description")]
    pub category_level2: Option<String>,

    #[serde(rename = "Omschrijving_3", alias = "categoryLevel3", default, deserialize_with = "de_opt_string")]
    #[schemars(description = "Category description")]
    pub category_level3: Option<String>,

    #[serde(rename = "Categorie", alias = "category", default, deserialize_with = "de_opt_string")]
    pub category: Option<String>,

    #[serde(rename = "Bedrag_debet", alias = "debitAmount", default, deserialize_with = "de_opt_f64")]
    pub debit_amount: Option<f64>,

    #[serde(rename = "Bedrag_credit", alias = "creditAmount", default, deserialize_with = "de_opt_f64")]
    pub credit_amount: Option<f64>,

    #[serde(rename = "Boekstuknummer", alias = "documentNumber", default, deserialize_with = "de_opt_string")]
    #[schemars(description = "Journal document number grouping the lines of one transaction")]
    pub document_number: Option<String>,

    #[serde(rename = "Administratie", alias = "administrationId", default, deserialize_with = "de_opt_string")]
    pub administration_id: Option<String>,
}

impl RawTransactionRecord {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RawTransactionRecord)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SkipReason {
    MissingYear,
    MissingPeriod,
    PeriodOutOfRange { period: i64 },
    YearOutOfRange { year: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    /// Position of the line in the raw input.
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionOutcome {
    pub records: Vec<TransactionRecord>,
    pub skipped: Vec<SkippedRecord>,
}

pub fn normalize_record(
    raw: &RawTransactionRecord,
) -> std::result::Result<TransactionRecord, SkipReason> {
    let year = raw.year.ok_or(SkipReason::MissingYear)?;
    let year = i32::try_from(year).map_err(|_| SkipReason::YearOutOfRange { year })?;
    let period = raw.period.ok_or(SkipReason::MissingPeriod)?;
    if !(1..=12).contains(&period) {
        return Err(SkipReason::PeriodOutOfRange { period });
    }

    Ok(TransactionRecord {
        year,
        period: period as u32,
        booking_date: raw.booking_date.as_deref().and_then(parse_booking_date),
        account_number: text(&raw.account_number),
        account_type: raw.account_type_name.as_deref().and_then(AccountType::parse),
        account_characteristic: text(&raw.account_characteristic),
        category_level2: text(&raw.category_level2),
        category_level3: text(&raw.category_level3),
        category: text(&raw.category),
        debit_amount: finite_or_zero(raw.debit_amount.unwrap_or(0.0)),
        credit_amount: finite_or_zero(raw.credit_amount.unwrap_or(0.0)),
        document_number: text(&raw.document_number),
        administration_id: text(&raw.administration_id),
    })
}

/// Normalizes a batch of raw lines. Lines that cannot be placed in a month are
/// reported in `skipped` instead of failing the batch.
pub fn normalize_records(raw: &[RawTransactionRecord]) -> IngestionOutcome {
    let mut outcome = IngestionOutcome::default();

    for (index, line) in raw.iter().enumerate() {
        match normalize_record(line) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => {
                debug!("Skipping raw record #{}: {:?}", index, reason);
                outcome.skipped.push(SkippedRecord { index, reason });
            }
        }
    }

    debug!(
        "Normalized {} records, skipped {}",
        outcome.records.len(),
        outcome.skipped.len()
    );

    outcome
}

/// Parses a JSON array of raw export lines.
pub fn parse_raw_records_json(json: &str) -> Result<Vec<RawTransactionRecord>> {
    Ok(serde_json::from_str(json)?)
}

/// Keeps records of the selected administrations. An empty selection keeps everything.
pub fn filter_by_administrations(
    records: &[TransactionRecord],
    administrations: &[AdministrationId],
) -> Vec<TransactionRecord> {
    records
        .iter()
        .filter(|r| administrations.is_empty() || administrations.contains(&r.administration_id))
        .cloned()
        .collect()
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn parse_booking_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d-%m-%Y"))
        .ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.map(|v| match v {
        Loose::Int(i) => i.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Text(s) => s,
    }))
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.and_then(|v| match v {
        Loose::Int(i) => Some(i),
        Loose::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        Loose::Float(_) => None,
        Loose::Text(s) => s.trim().parse().ok(),
    }))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.and_then(|v| match v {
        Loose::Int(i) => Some(i as f64),
        Loose::Float(f) => Some(f),
        Loose::Text(s) => parse_amount(&s),
    }))
}

/// Accepts `1234.56` as well as the Dutch `1234,56`.
fn parse_amount(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('.') {
        trimmed.parse().ok()
    } else {
        trimmed.replace(',', ".").parse().ok()
    }
}
