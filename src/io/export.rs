use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{ExpenseService, ExpenseView};
use crate::domain::{format_amount, Balance, Expense, User};

/// Database snapshot for JSON export/import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub users: Vec<User>,
    pub expenses: Vec<Expense>,
}

/// Exporter for converting expense data to various formats
pub struct Exporter<'a> {
    service: &'a ExpenseService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a ExpenseService) -> Self {
        Self { service }
    }

    /// Export expenses to CSV format
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.service.list_all_expenses().await?;
        write_expenses_csv(&expenses, writer)?;
        Ok(expenses.len())
    }

    /// Export users and expenses as a JSON snapshot
    pub async fn export_expenses_json<W: Write>(&self, mut writer: W) -> Result<ExpenseSnapshot> {
        let snapshot = ExpenseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            users: self.service.list_users().await?,
            expenses: self.service.list_all_expenses().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }

    /// Export one viewer's balance as JSON
    pub async fn export_balance_json<W: Write>(&self, viewer: &str, mut writer: W) -> Result<Balance> {
        let balance = self.service.get_balance(viewer).await?;

        let json = serde_json::to_string_pretty(&balance)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(balance)
    }

    /// Export one viewer's per-expense deltas to CSV format
    pub async fn export_balance_csv<W: Write>(&self, viewer: &str, writer: W) -> Result<Balance> {
        let balance = self.service.get_balance(viewer).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["expense_id", "delta"])?;
        for (id, delta) in &balance.by_expense {
            csv_writer.write_record([id.as_str(), format!("{:.2}", delta).as_str()])?;
        }
        csv_writer.write_record(["net", format!("{:.2}", balance.net).as_str()])?;

        csv_writer.flush()?;
        Ok(balance)
    }
}

const EXPENSE_CSV_HEADER: [&str; 7] = [
    "id",
    "date",
    "description",
    "amount",
    "paid_by",
    "participants",
    "shares",
];

/// Write expenses as CSV. Participants are `;`-separated, shares are `user:fraction` pairs.
pub fn write_expenses_csv<W: Write>(expenses: &[Expense], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(EXPENSE_CSV_HEADER)?;
    for expense in expenses {
        csv_writer.write_record(expense_csv_fields(expense))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write expenses as seen by one viewer: the expense columns followed by
/// the viewer's rounded delta and how the expense relates to them.
pub fn write_expense_views_csv<W: Write>(views: &[ExpenseView], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(
        EXPENSE_CSV_HEADER
            .iter()
            .chain(&["payer_name", "delta", "relation"]),
    )?;
    for view in views {
        let mut fields = expense_csv_fields(&view.expense).to_vec();
        fields.push(view.payer_name.clone());
        fields.push(format_amount(view.delta));
        fields.push(view.relation.to_string());
        csv_writer.write_record(&fields)?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn expense_csv_fields(expense: &Expense) -> [String; 7] {
    let participants = expense
        .participants
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";");
    let shares = expense
        .shares
        .as_ref()
        .map(|shares| {
            shares
                .iter()
                .map(|(user, fraction)| format!("{}:{}", user, fraction))
                .collect::<Vec<_>>()
                .join(";")
        })
        .unwrap_or_default();

    [
        expense.id.clone(),
        expense.date.format("%Y-%m-%d").to_string(),
        expense.description.clone(),
        expense.amount.to_string(),
        expense.paid_by.clone(),
        participants,
        shares,
    ]
}
