mod common;

use anyhow::Result;
use coinshire::domain::{compute_balance, Expense};
use coinshire::io::{load_expenses_json, Exporter, ImportOptions, Importer};
use common::{parse_date, test_service, SampleExpenses};

#[tokio::test]
async fn test_export_then_import_into_fresh_database() -> Result<()> {
    let (source, _source_temp) = test_service().await?;
    SampleExpenses::record(&source).await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&source)
        .export_expenses_json(&mut buffer)
        .await?;
    assert_eq!(snapshot.expenses.len(), 4);
    assert_eq!(snapshot.users.len(), 2);

    let (target, _target_temp) = test_service().await?;
    let result = Importer::new(&target)
        .import_expenses_json(buffer.as_slice(), ImportOptions::default())
        .await?;
    assert_eq!(result.imported, 4);
    assert!(result.errors.is_empty());

    assert_eq!(
        source.get_balance("u1").await?,
        target.get_balance("u1").await?
    );

    Ok(())
}

#[tokio::test]
async fn test_import_dry_run_stores_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = Importer::new(&service)
        .import_expenses(
            SampleExpenses::all(),
            ImportOptions {
                dry_run: true,
                skip_duplicates: false,
            },
        )
        .await?;

    assert_eq!(result.imported, 4);
    assert_eq!(service.count_expenses().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_import_duplicates() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleExpenses::record(&service).await?;
    let importer = Importer::new(&service);

    let result = importer
        .import_expenses(SampleExpenses::all(), ImportOptions::default())
        .await?;
    assert_eq!(result.imported, 0);
    assert_eq!(result.errors.len(), 4);

    let result = importer
        .import_expenses(
            SampleExpenses::all(),
            ImportOptions {
                dry_run: false,
                skip_duplicates: true,
            },
        )
        .await?;
    assert_eq!(result.imported, 0);
    assert_eq!(result.skipped, 4);
    assert!(result.errors.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_import_reports_invalid_expenses() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let expenses = vec![
        Expense::new("x1", "Unknown payer", 10.0, parse_date("2025-01-01"), "u9")
            .with_participants(["u1", "u9"]),
        Expense::new("x2", "Negative", -4.0, parse_date("2025-01-01"), "u1")
            .with_participants(["u1", "u2"]),
        Expense::new("x3", "Fine", 4.0, parse_date("2025-01-01"), "u1")
            .with_participants(["u1", "u2"]),
    ];

    let result = Importer::new(&service)
        .import_expenses(expenses, ImportOptions::default())
        .await?;

    assert_eq!(result.imported, 1);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].index, 1);
    assert_eq!(result.errors[0].expense_id.as_deref(), Some("x1"));
    assert_eq!(result.errors[1].index, 2);
    assert_eq!(service.count_expenses().await?, 1);

    Ok(())
}

fn invalid_batch() -> Vec<Expense> {
    vec![
        Expense::new("x1", "Unknown payer", 10.0, parse_date("2025-01-01"), "u9")
            .with_participants(["u1", "u9"]),
        Expense::new("x2", "Negative", -4.0, parse_date("2025-01-01"), "u1")
            .with_participants(["u1", "u2"]),
        Expense::new("x3", "  ", 4.0, parse_date("2025-01-01"), "u1")
            .with_participants(["u1", "u2"]),
        Expense::new("x4", "Fine", 4.0, parse_date("2025-01-01"), "u1")
            .with_participants(["u1", "u2"]),
    ]
}

#[tokio::test]
async fn test_import_dry_run_reports_what_a_real_import_would() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let importer = Importer::new(&service);

    let preview = importer
        .import_expenses(
            invalid_batch(),
            ImportOptions {
                dry_run: true,
                skip_duplicates: false,
            },
        )
        .await?;
    assert_eq!(service.count_expenses().await?, 0);

    let real = importer
        .import_expenses(invalid_batch(), ImportOptions::default())
        .await?;

    assert_eq!(preview.imported, 1);
    assert_eq!(preview.imported, real.imported);
    assert_eq!(preview.errors.len(), 3);
    assert_eq!(preview.errors.len(), real.errors.len());
    for (dry, stored) in preview.errors.iter().zip(&real.errors) {
        assert_eq!(dry.index, stored.index);
        assert_eq!(dry.expense_id, stored.expense_id);
    }
    assert_eq!(service.count_expenses().await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_import_repeated_id_within_batch_is_a_duplicate() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let importer = Importer::new(&service);

    let mut batch = SampleExpenses::all();
    batch.push(batch[0].clone());

    let preview = importer
        .import_expenses(
            batch.clone(),
            ImportOptions {
                dry_run: true,
                skip_duplicates: false,
            },
        )
        .await?;
    assert_eq!(preview.imported, 4);
    assert_eq!(preview.errors.len(), 1);
    assert_eq!(preview.errors[0].index, 5);

    let result = importer
        .import_expenses(
            batch,
            ImportOptions {
                dry_run: false,
                skip_duplicates: true,
            },
        )
        .await?;
    assert_eq!(result.imported, 4);
    assert_eq!(result.skipped, 1);
    assert!(result.errors.is_empty());
    assert_eq!(service.count_expenses().await?, 4);

    Ok(())
}

#[tokio::test]
async fn test_export_balance_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleExpenses::record(&service).await?;

    let mut buffer = Vec::new();
    let balance = Exporter::new(&service)
        .export_balance_csv("u1", &mut buffer)
        .await?;
    let text = String::from_utf8(buffer)?;
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "expense_id,delta");
    assert_eq!(lines[1], "e1,48.00");
    assert_eq!(lines.len(), balance.by_expense.len() + 2);
    assert!(lines[lines.len() - 1].starts_with("net,"));

    Ok(())
}

#[test]
fn test_preview_matches_stored_balance_rules() -> Result<()> {
    // The offline preview reads the same JSON the exporter writes
    let json = serde_json::to_string(&SampleExpenses::all())?;
    let expenses = load_expenses_json(json.as_bytes())?;

    let preview = compute_balance("u2", &expenses);
    assert_eq!(preview, compute_balance("u2", &SampleExpenses::all()));
    assert_eq!(preview.by_expense.len(), 4);

    Ok(())
}
