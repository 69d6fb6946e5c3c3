use crate::schema::{AccountType, MonthKey, NetAmountConvention, TransactionRecord};
use log::debug;
use serde::{Deserialize, Serialize};

/// Balance position carried into a period, built from every record booked before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningBalance {
    pub activa: f64,
    /// Absolute value of the debit-style Passiva sum.
    pub passiva: f64,
    pub eigen_vermogen: f64,
    pub totaal_passiva: f64,
    pub accumulated_pl: f64,
    /// Every record before the boundary, including those with an unrecognized
    /// account type.
    pub record_count: usize,
    /// The period start; the snapshot applies to everything strictly before it.
    pub period_before: MonthKey,
}

/// Sums all records strictly before `period_start` into an opening position.
///
/// Returns `None` when no record precedes the period, which callers must show as
/// "no opening balance available" rather than as a zero balance.
pub fn calculate_opening_balance(
    all_records: &[TransactionRecord],
    period_start: MonthKey,
) -> Option<OpeningBalance> {
    let opening_records: Vec<&TransactionRecord> = all_records
        .iter()
        .filter(|r| r.has_valid_period() && r.is_before(period_start))
        .collect();

    if opening_records.is_empty() {
        debug!("No records before {}, no opening balance", period_start);
        return None;
    }

    let mut activa = 0.0;
    let mut passiva = 0.0;
    let mut kosten = 0.0;
    let mut opbrengsten = 0.0;

    for record in &opening_records {
        let amount = record.net_amount(NetAmountConvention::DebitPositive);
        match record.account_type {
            Some(AccountType::Activa) => activa += amount,
            Some(AccountType::Passiva) => passiva += amount,
            Some(AccountType::Kosten) => kosten += amount,
            Some(AccountType::Opbrengsten) => opbrengsten += amount,
            None => {}
        }
    }

    let accumulated_pl = opbrengsten + kosten;
    let eigen_vermogen = activa + passiva + accumulated_pl;
    let totaal_passiva = passiva.abs() + eigen_vermogen;

    debug!(
        "Opening balance before {}: {} records, activa {:.2}, passiva {:.2}",
        period_start,
        opening_records.len(),
        activa,
        passiva
    );

    Some(OpeningBalance {
        activa,
        passiva: passiva.abs(),
        eigen_vermogen,
        totaal_passiva,
        accumulated_pl,
        record_count: opening_records.len(),
        period_before: period_start,
    })
}
