// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use coinshire::application::ExpenseService;
use coinshire::domain::{default_users, Expense, NewExpense};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database and the two default users
pub async fn test_service() -> Result<(ExpenseService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let users = default_users("You", "Alex");
    let service = ExpenseService::init(db_path.to_str().unwrap(), &users).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into a NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: the sample history both users start from
pub struct SampleExpenses;

impl SampleExpenses {
    pub fn all() -> Vec<Expense> {
        vec![
            Expense::new(
                "e1",
                "Dinner at Bella Italia",
                96.0,
                parse_date("2025-12-01"),
                "u1",
            )
            .with_participants(["u1", "u2"]),
            Expense::new("e2", "Cab from airport", 42.5, parse_date("2025-12-02"), "u2")
                .with_participants(["u1", "u2"])
                .with_shares([("u2", 0.7), ("u1", 0.3)]),
            Expense::new(
                "e3",
                "Groceries for weekend",
                78.99,
                parse_date("2025-12-03"),
                "u2",
            )
            .with_participants(["u1", "u2"]),
            Expense::new("e4", "Coffee run", 12.0, parse_date("2025-12-04"), "u1")
                .with_participants(["u1", "u2"])
                .with_shares([("u1", 0.6), ("u2", 0.4)]),
        ]
    }

    /// Store the sample history directly, keeping the fixed ids
    pub async fn record(service: &ExpenseService) -> Result<()> {
        for expense in Self::all() {
            service.record_expense(&expense).await?;
        }
        Ok(())
    }
}

/// Record an expense created through the normal creation path
pub async fn add_expense(
    service: &ExpenseService,
    description: &str,
    total: f64,
    paid_by: &str,
    payer_share_pct: f64,
    date: &str,
) -> Result<Expense> {
    let new_expense = NewExpense::new(description, total, paid_by)
        .with_payer_share(payer_share_pct)
        .with_date(parse_date(date));
    Ok(service.create_expense(new_expense).await?)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
