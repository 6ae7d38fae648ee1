use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};

use crate::application::{ExpenseFilter, ExpenseService};
use crate::domain::{
    compute_balance, default_users, format_amount, parse_amount, Balance, NewExpense,
};
use crate::io::{
    load_expenses_json, write_expense_views_csv, Exporter, ImportOptions, Importer,
};

/// Coinshire - Shared expenses for two
#[derive(Parser)]
#[command(name = "coinshire")]
#[command(about = "A local-first tracker of who owes whom between two people")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "COINSHIRE_DATABASE", default_value = "coinshire.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database with the two users
    Init {
        /// Display name of the first user (u1)
        #[arg(long, env = "COINSHIRE_USER1_NAME", default_value = "You")]
        user1_name: String,

        /// Display name of the second user (u2)
        #[arg(long, env = "COINSHIRE_USER2_NAME", default_value = "Alex")]
        user2_name: String,
    },

    /// List users
    Users,

    /// List recent expenses as seen by a user
    Expenses {
        /// User whose view of the expenses to show
        #[arg(long = "as")]
        viewer: String,

        /// Maximum number of expenses to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Number of expenses to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Record a new expense
    Add {
        /// Total amount (e.g., "42.50" or "42")
        total: String,

        /// What the expense was for
        #[arg(short, long)]
        description: String,

        /// User who paid
        #[arg(short, long)]
        paid_by: String,

        /// Payer's own share in percent; the other user takes the rest
        #[arg(short, long, default_value = "50")]
        share: f64,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Expense ID
        id: String,
    },

    /// Show a user's net balance over all expenses
    Balance {
        /// User to compute the balance for
        user: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Compute a balance from a JSON list of expenses without touching the database
    Preview {
        /// User to compute the balance for
        user: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export expenses or a balance
    Export {
        /// What to export: expenses, balance
        export_type: String,

        /// User whose balance to export (required for balance)
        #[arg(long = "as")]
        viewer: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Import expenses from JSON
    Import {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip expenses whose ID is already recorded
        #[arg(long)]
        skip_duplicates: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init {
                user1_name,
                user2_name,
            } => {
                let users = default_users(&user1_name, &user2_name);
                ExpenseService::init(&self.database, &users).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Users => {
                let service = ExpenseService::connect(&self.database).await?;
                let users = service.list_users().await?;
                if users.is_empty() {
                    println!("No users found. Run `coinshire init` first.");
                } else {
                    println!("{:<8} NAME", "ID");
                    println!("{}", "-".repeat(30));
                    for user in users {
                        println!("{:<8} {}", user.id, user.name);
                    }
                }
            }

            Commands::Expenses {
                viewer,
                limit,
                offset,
                format,
            } => {
                let service = ExpenseService::connect(&self.database).await?;
                run_expenses_command(&service, &viewer, limit, offset, &format).await?;
            }

            Commands::Add {
                total,
                description,
                paid_by,
                share,
                date,
            } => {
                let service = ExpenseService::connect(&self.database).await?;
                let total =
                    parse_amount(&total).context("Invalid amount format. Use '42.50' or '42'")?;

                let mut new_expense =
                    NewExpense::new(description, total, paid_by).with_payer_share(share);
                if let Some(date_str) = date {
                    let date = parse_date(&date_str).with_context(|| {
                        format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)
                    })?;
                    new_expense = new_expense.with_date(date);
                }

                let expense = service.create_expense(new_expense).await?;
                println!(
                    "Recorded expense: {} {} paid by {} ({})",
                    expense.description,
                    format_amount(expense.amount),
                    expense.paid_by,
                    expense.id
                );
            }

            Commands::Delete { id } => {
                let service = ExpenseService::connect(&self.database).await?;
                service.delete_expense(&id).await?;
                println!("Deleted expense: {}", id);
            }

            Commands::Balance { user, format } => {
                let service = ExpenseService::connect(&self.database).await?;
                let balance = service.get_balance(&user).await?;
                print_balance(&balance, &format)?;
            }

            Commands::Preview {
                user,
                input,
                format,
            } => {
                let reader = open_input(input.as_deref())?;
                let expenses = load_expenses_json(reader)?;
                let balance = compute_balance(&user, &expenses);
                print_balance(&balance, &format)?;
            }

            Commands::Export {
                export_type,
                viewer,
                output,
                format,
            } => {
                let service = ExpenseService::connect(&self.database).await?;
                run_export_command(
                    &service,
                    &export_type,
                    viewer.as_deref(),
                    output.as_deref(),
                    format.as_deref(),
                )
                .await?;
            }

            Commands::Import {
                input,
                dry_run,
                skip_duplicates,
            } => {
                let service = ExpenseService::connect(&self.database).await?;
                run_import_command(&service, input.as_deref(), dry_run, skip_duplicates).await?;
            }
        }

        Ok(())
    }
}

async fn run_expenses_command(
    service: &ExpenseService,
    viewer: &str,
    limit: usize,
    offset: usize,
    format: &str,
) -> Result<()> {
    let filter = ExpenseFilter::page(limit, offset);
    write_expense_listing(service, viewer, filter, format, io::stdout().lock()).await
}

/// Write a page of expenses as seen by `viewer` in the given format.
/// Every format goes through the viewer check, so an unknown viewer is an error.
pub async fn write_expense_listing<W: Write>(
    service: &ExpenseService,
    viewer: &str,
    filter: ExpenseFilter,
    format: &str,
    mut out: W,
) -> Result<()> {
    let views = service.get_expense_views(viewer, filter).await?;

    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(&views)?)?;
        }
        "csv" => {
            write_expense_views_csv(&views, out)?;
        }
        _ => {
            if views.is_empty() {
                writeln!(out, "No expenses found.")?;
                return Ok(());
            }

            writeln!(
                out,
                "{:<12} {:>10} {:<12} {:<30} IMPACT",
                "DATE", "AMOUNT", "PAID BY", "DESCRIPTION"
            )?;
            writeln!(out, "{}", "-".repeat(90))?;

            for view in views {
                let paid_by = if view.expense.is_payer(viewer) {
                    "you".to_string()
                } else {
                    view.payer_name.clone()
                };
                let impact = if view.delta == 0.0 {
                    view.relation.to_string()
                } else {
                    format!("{} {}", view.relation, format_amount(view.delta.abs()))
                };

                writeln!(
                    out,
                    "{:<12} {:>10} {:<12} {:<30} {}",
                    view.expense.date.format("%Y-%m-%d"),
                    format_amount(view.expense.amount),
                    truncate(&paid_by, 12),
                    truncate(&view.expense.description, 30),
                    impact
                )?;
                writeln!(out, "{:<12} {}", "", view.expense.id)?;
            }
        }
    }
    Ok(())
}

fn print_balance(balance: &Balance, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(balance)?);
        }
        _ => {
            println!("{}", balance_banner(balance.net));
            if !balance.by_expense.is_empty() {
                println!();
                println!("{:<36} {:>10}", "EXPENSE", "DELTA");
                println!("{}", "-".repeat(47));
                for (id, delta) in &balance.by_expense {
                    println!("{:<36} {:>10}", truncate(id, 36), format_amount(*delta));
                }
            }
        }
    }
    Ok(())
}

/// One-line summary of a net balance, from the viewer's point of view.
pub fn balance_banner(net: f64) -> String {
    if net > 0.0 {
        format!("You are owed {}", format_amount(net.abs()))
    } else if net < 0.0 {
        format!("You owe {}", format_amount(net.abs()))
    } else {
        "All settled up!".to_string()
    }
}

async fn run_export_command(
    service: &ExpenseService,
    export_type: &str,
    viewer: Option<&str>,
    output: Option<&str>,
    format: Option<&str>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create output file {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };
    let exporter = Exporter::new(service);
    let format = format.unwrap_or("json");

    match (export_type, format) {
        ("expenses", "csv") => {
            let count = exporter.export_expenses_csv(writer).await?;
            if output.is_some() {
                println!("Exported {} expenses", count);
            }
        }
        ("expenses", "json") => {
            let snapshot = exporter.export_expenses_json(writer).await?;
            if output.is_some() {
                println!("Exported {} expenses", snapshot.expenses.len());
            }
        }
        ("balance", "json" | "csv") => {
            let viewer =
                viewer.ok_or_else(|| anyhow::anyhow!("Balance export needs --as <user>"))?;
            if format == "csv" {
                exporter.export_balance_csv(viewer, writer).await?;
            } else {
                exporter.export_balance_json(viewer, writer).await?;
            }
        }
        ("expenses" | "balance", other) => {
            anyhow::bail!("Unsupported format '{}'. Valid: csv, json", other)
        }
        (other, _) => {
            anyhow::bail!("Unknown export type '{}'. Valid: expenses, balance", other)
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &ExpenseService,
    input: Option<&str>,
    dry_run: bool,
    skip_duplicates: bool,
) -> Result<()> {
    let reader = open_input(input)?;
    let importer = Importer::new(service);
    let options = ImportOptions {
        dry_run,
        skip_duplicates,
    };

    let result = importer.import_expenses_json(reader, options).await?;

    if dry_run {
        println!("Dry run: {} expenses would be imported", result.imported);
    } else {
        println!("Imported {} expenses", result.imported);
    }
    if result.skipped > 0 {
        println!("Skipped {} duplicates", result.skipped);
    }
    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            println!(
                "  #{} ({}): {}",
                err.index,
                err.expense_id.as_deref().unwrap_or("?"),
                err.error
            );
        }
        anyhow::bail!("{} expenses failed to import", result.errors.len());
    }

    Ok(())
}

fn open_input(input: Option<&str>) -> Result<Box<dyn Read>> {
    Ok(match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input file {}", path))?,
        )),
        None => Box::new(io::stdin()),
    })
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").context("Date must be in YYYY-MM-DD format")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_banner() {
        assert_eq!(balance_banner(12.5), "You are owed 12.50");
        assert_eq!(balance_banner(-3.0), "You owe 3.00");
        assert_eq!(balance_banner(0.0), "All settled up!");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Dinner", 10), "Dinner");
        assert_eq!(truncate("Groceries for weekend", 10), "Groceri...");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-12-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
        );
        assert!(parse_date("01/12/2025").is_err());
    }

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from([
            "coinshire",
            "add",
            "42.50",
            "--description",
            "Cab",
            "--paid-by",
            "u2",
            "--share",
            "70",
        ])
        .unwrap();

        match cli.command {
            Commands::Add {
                total,
                paid_by,
                share,
                date,
                ..
            } => {
                assert_eq!(total, "42.50");
                assert_eq!(paid_by, "u2");
                assert_eq!(share, 70.0);
                assert!(date.is_none());
            }
            _ => panic!("expected add command"),
        }
    }
}
