use anyhow::Context;
use ledger_reports::*;

const LEDGER_EXPORT: &str = "\
Jaar,Periode,Boekdatum,Rekeningnummer,Type_rekening,Kenmerk_rekening,Omschrijving_2,Omschrijving_3,Bedrag_debet,Bedrag_credit,Boekstuknummer,Administratie
2023,12,2023-12-31,1100,Activa,Grootboekrekening,Bank,Liquide middelen,10000,,23999,1
2023,12,2023-12-31,900,Passiva,Grootboekrekening,Aandelenkapitaal,Eigen vermogen,,10000,23999,1
2024,1,2024-01-10,1300,Activa,Debiteuren,Debiteur Jansen,,\"2420,00\",,24001,1
2024,1,2024-01-10,8000,Opbrengsten,Grootboekrekening,Omzet advies,Omzet,,2000,24001,1
2024,1,2024-01-10,1500,Passiva,Grootboekrekening,Te betalen btw,Belastingen,,420,24001,1
2024,1,2024-01-15,7000,Kosten,Grootboekrekening,Inkoop materialen,Inkoop,500,,24002,1
2024,1,2024-01-15,1600,Passiva,Crediteuren,Crediteur Bouwmaat,,,500,24002,1
2024,2,2024-02-05,1100,Activa,Grootboekrekening,Bank,Liquide middelen,2420,,24003,1
2024,2,2024-02-05,1300,Activa,Debiteuren,Debiteur Jansen,,,2420,24003,1
2024,2,2024-02-20,4000,Kosten,Grootboekrekening,Huur kantoor,Huisvesting,800,,24004,1
2024,2,2024-02-20,1100,Activa,Grootboekrekening,Bank,Liquide middelen,,800,24004,1
2024,2,,4000,Kosten,Grootboekrekening,Huur kantoor,Huisvesting,100,,24005,2
,2,,4000,Kosten,Grootboekrekening,Huur kantoor,Huisvesting,100,,24006,1
2024,13,,8000,Opbrengsten,Grootboekrekening,Omzet advies,Omzet,,100,24007,1
";

fn load_export() -> anyhow::Result<IngestionOutcome> {
    let mut reader = csv::ReaderBuilder::new().from_reader(LEDGER_EXPORT.as_bytes());
    let mut raw = Vec::new();
    for row in reader.deserialize::<RawTransactionRecord>() {
        raw.push(row.context("malformed ledger export row")?);
    }
    Ok(normalize_records(&raw))
}

fn mapping() -> CategoryMapping {
    CategoryMapping::from_pairs([
        ("Omzet", EnhancedBucket::Omzet),
        ("Inkoop", EnhancedBucket::InkoopwaardeOmzet),
        ("Huisvesting", EnhancedBucket::Huisvestingskosten),
    ])
}

#[test]
fn test_csv_export_through_full_pipeline() -> anyhow::Result<()> {
    let outcome = load_export()?;
    assert_eq!(outcome.records.len(), 12);
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.skipped[0].reason, SkipReason::MissingYear);
    assert_eq!(
        outcome.skipped[1].reason,
        SkipReason::PeriodOutOfRange { period: 13 }
    );

    let store = InMemoryRecordStore::new(outcome.records);
    let request = ReportRequest::new(PeriodRange::new(2024, 1, 2024, 2)?)
        .with_administrations(vec!["1".to_string()]);
    let report = process_financial_report(&store, &mapping(), &request)?;

    let opening = report.opening_balance.context("expected an opening balance")?;
    assert_eq!(opening.activa, 10000.0);
    assert_eq!(opening.passiva, 10000.0);
    assert_eq!(opening.eigen_vermogen, 0.0);

    assert_eq!(
        report.months,
        vec![MonthKey::new(2024, 1)?, MonthKey::new(2024, 2)?]
    );

    let pnl = report
        .enhanced_pnl
        .available()
        .context("mapping was supplied")?;
    assert_eq!(pnl.line(PnlLine::Omzet).context("Omzet row")?.total, 2000.0);
    assert_eq!(
        pnl.line(PnlLine::InkoopwaardeOmzet)
            .context("Inkoop row")?
            .total,
        -500.0
    );
    // Administration 2 rent is filtered out.
    assert_eq!(
        pnl.line(PnlLine::Huisvestingskosten)
            .context("Huisvesting row")?
            .per_month_amount,
        vec![0.0, -800.0]
    );

    assert!(report.balance_check_total.is_balanced);
    assert!(report.health.unbalanced_months.is_empty());
    assert!(report.health.unbalanced_documents.is_empty());
    assert!(report.health.dso_days.is_some());

    Ok(())
}

#[test]
fn test_balance_identity_for_balanced_and_unbalanced_books() {
    let balanced = vec![
        TransactionRecord::new(2024, 3, Some(AccountType::Activa), 1200.0, 0.0)
            .with_category("Liquide middelen"),
        TransactionRecord::new(2024, 3, Some(AccountType::Opbrengsten), 0.0, 1500.0)
            .with_characteristic("Grootboekrekening")
            .with_category("Omzet"),
        TransactionRecord::new(2024, 3, Some(AccountType::Kosten), 300.0, 0.0)
            .with_characteristic("Grootboekrekening")
            .with_category("Kantoor"),
    ];
    let march = MonthKey::new(2024, 3).unwrap();

    let sheet = BalanceSheet::new(&balanced);
    let check = sheet.balance_check(march);
    assert_eq!(check.balance_difference, 1200.0);
    assert_eq!(check.wv_result, 1200.0);
    assert!(check.check.abs() < 0.01);
    assert!(check.is_balanced);

    let mut unbalanced = balanced.clone();
    unbalanced.push(
        TransactionRecord::new(2024, 3, Some(AccountType::Activa), 250.0, 0.0)
            .with_category("Liquide middelen"),
    );
    let sheet = BalanceSheet::new(&unbalanced);
    let check = sheet.balance_check(march);
    assert!((check.check - 250.0).abs() < 1e-9);
    assert!(!check.is_balanced);
}

#[test]
fn test_constant_balances_keep_cash_flow_check_at_zero() {
    let mut records = Vec::new();
    for month in 1..=4 {
        records.push(
            TransactionRecord::new(2024, month, Some(AccountType::Activa), 300.0, 0.0)
                .with_characteristic("Debiteuren"),
        );
        records.push(
            TransactionRecord::new(2024, month, Some(AccountType::Activa), 50.0, 0.0)
                .with_category("Liquide middelen"),
        );
        records.push(
            TransactionRecord::new(2024, month, Some(AccountType::Passiva), 0.0, 350.0)
                .with_characteristic("Crediteuren"),
        );
    }

    let request = ReportRequest::new(PeriodRange::new(2024, 2, 2024, 4).unwrap());
    let report = process_financial_report(records.as_slice(), &mapping(), &request).unwrap();
    let cash_flow = report.cash_flow.available().unwrap();

    assert_eq!(cash_flow.per_month.len(), 3);
    for month in &cash_flow.per_month {
        assert!(month.has_previous_month);
        assert_eq!(month.mutatie_netto_werkkapitaal, 0.0);
        assert_eq!(month.investeringen, 0.0);
        assert_eq!(month.dividend, 0.0);
        assert_eq!(month.check, 0.0);
    }
    assert!(report.health.cash_flow_check_failures.is_empty());
}

#[test]
fn test_opening_balance_excludes_the_start_month() {
    let records = vec![
        TransactionRecord::new(2024, 2, Some(AccountType::Activa), 100.0, 0.0),
        TransactionRecord::new(2024, 3, Some(AccountType::Activa), 900.0, 0.0),
    ];

    let opening = calculate_opening_balance(&records, MonthKey::new(2024, 3).unwrap()).unwrap();
    assert_eq!(opening.activa, 100.0);
    assert_eq!(opening.record_count, 1);

    assert!(calculate_opening_balance(&records, MonthKey::new(2024, 2).unwrap()).is_none());
}

#[test]
fn test_debtor_accounts_are_never_broken_down() {
    let records: Vec<TransactionRecord> = (1..=25)
        .map(|n| {
            TransactionRecord::new(2024, 1, Some(AccountType::Activa), 10.0, 0.0)
                .with_account(format!("13{:02}", n), format!("Debiteur {}", n))
                .with_characteristic("Debiteuren")
        })
        .collect();

    let hierarchy = build_balance_hierarchy(&records);
    let node = &hierarchy[&AccountType::Activa]["Debiteuren"];
    assert!(node.is_receivable_payable_bucket);
    assert!(node.accounts.is_empty());
    assert!((node.total_amount + 250.0).abs() < 1e-9);
}

#[test]
fn test_report_serializes_to_json() -> anyhow::Result<()> {
    let records = vec![
        TransactionRecord::new(2024, 1, Some(AccountType::Activa), 5000.0, 0.0)
            .with_category("Liquide middelen"),
        TransactionRecord::new(2024, 1, Some(AccountType::Opbrengsten), 0.0, 5000.0)
            .with_characteristic("Grootboekrekening")
            .with_category("Omzet"),
    ];
    let request = ReportRequest::new(PeriodRange::new(2024, 1, 2024, 1)?);

    let report = process_financial_report(records.as_slice(), &mapping(), &request)?;
    let json = serde_json::to_value(&report)?;

    assert!(json["openingBalance"].is_null());
    assert_eq!(json["months"], serde_json::json!(["2024-01"]));
    assert_eq!(json["enhancedPnl"]["status"], "available");
    assert_eq!(
        json["balanceHierarchy"]["Activa"]["Liquide middelen"]["totalAmount"],
        5000.0
    );

    let unmapped = process_financial_report(records.as_slice(), &CategoryMapping::new(), &request)?;
    let json = serde_json::to_value(&unmapped)?;
    assert_eq!(json["cashFlow"]["status"], "mappingUnavailable");

    Ok(())
}
