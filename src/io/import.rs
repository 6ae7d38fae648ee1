use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, warn};

use crate::application::ExpenseService;
use crate::domain::Expense;
use crate::io::export::ExpenseSnapshot;

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    /// Position of the expense in the input (1-based)
    pub index: usize,
    pub expense_id: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub skip_duplicates: bool,
}

/// Accepted JSON inputs: a bare array of expenses or a full export snapshot.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpenseDocument {
    List(Vec<Expense>),
    Snapshot(ExpenseSnapshot),
}

/// Read a list of expenses from JSON, either a bare array or an export snapshot.
pub fn load_expenses_json<R: Read>(reader: R) -> Result<Vec<Expense>> {
    let document: ExpenseDocument =
        serde_json::from_reader(reader).context("Failed to parse expenses JSON")?;
    Ok(match document {
        ExpenseDocument::List(expenses) => expenses,
        ExpenseDocument::Snapshot(snapshot) => snapshot.expenses,
    })
}

/// Importer for loading expenses into the store
pub struct Importer<'a> {
    service: &'a ExpenseService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a ExpenseService) -> Self {
        Self { service }
    }

    /// Import expenses from JSON
    pub async fn import_expenses_json<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let expenses = load_expenses_json(reader)?;
        self.import_expenses(expenses, options).await
    }

    /// Import already-parsed expenses, keeping their identifiers.
    pub async fn import_expenses(
        &self,
        expenses: Vec<Expense>,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut result = ImportResult::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (i, expense) in expenses.into_iter().enumerate() {
            let index = i + 1;

            // Repeats within the batch count as duplicates, even in a dry run
            let duplicate = !seen.insert(expense.id.clone())
                || self.service.expense_exists(&expense.id).await?;
            if duplicate {
                if options.skip_duplicates {
                    debug!(id = %expense.id, "skipping duplicate expense");
                    result.skipped += 1;
                } else {
                    result.errors.push(ImportError {
                        index,
                        expense_id: Some(expense.id.clone()),
                        error: "Expense already exists".to_string(),
                    });
                }
                continue;
            }

            let outcome = if options.dry_run {
                self.service.validate_expense(&expense).await
            } else {
                self.service.record_expense(&expense).await
            };

            match outcome {
                Ok(()) => result.imported += 1,
                Err(e) => {
                    warn!(id = %expense.id, error = %e, "failed to import expense");
                    result.errors.push(ImportError {
                        index,
                        expense_id: Some(expense.id.clone()),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }
}
