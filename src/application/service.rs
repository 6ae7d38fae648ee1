use std::fmt;

use chrono::Utc;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::domain::{
    compute_balance, expense_delta, new_expense_id, other_user, round_to_cents, Amount, Balance,
    Expense, NewExpense, User,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing high-level operations over shared expenses.
/// This is the primary interface for any client (CLI, import/export, tests).
pub struct ExpenseService {
    repo: Repository,
}

/// Pagination for expense listings
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpenseFilter {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ExpenseFilter {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

/// How an expense relates to the person looking at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The viewer is owed money for this expense
    Lent,
    /// The viewer owes money for this expense
    Owes,
    /// The viewer paid exactly their own share
    Settled,
    /// The viewer participates but the expense nets to zero
    NoImpact,
    /// The viewer neither paid nor participates
    NotInvolved,
}

impl Relation {
    fn classify(viewer: &str, expense: &Expense, delta: Amount) -> Self {
        if delta > 0.0 {
            Relation::Lent
        } else if delta < 0.0 {
            Relation::Owes
        } else if expense.is_payer(viewer) {
            Relation::Settled
        } else if expense.is_participant(viewer) {
            Relation::NoImpact
        } else {
            Relation::NotInvolved
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Relation::Lent => "you lent",
            Relation::Owes => "you owe",
            Relation::Settled => "settled (you paid your share)",
            Relation::NoImpact => "no balance impact",
            Relation::NotInvolved => "not involved",
        };
        write!(f, "{}", label)
    }
}

impl Serialize for Relation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An expense as seen by one viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseView {
    #[serde(flatten)]
    pub expense: Expense,
    pub payer_name: String,
    /// Rounded effect of this expense on the viewer's balance
    pub delta: Amount,
    pub relation: Relation,
}

impl ExpenseService {
    /// Create a new expense service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a database at the given path and seed the two users.
    pub async fn init(database_path: &str, users: &[User]) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        repo.seed_users(users).await?;
        info!(database = database_path, "database initialized");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        debug!(database = database_path, "connected");
        Ok(Self::new(repo))
    }

    // ========================
    // User operations
    // ========================

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, AppError> {
        self.repo
            .list_users()
            .await?
            .into_iter()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::UnknownUser(id.to_string()))
    }

    // ========================
    // Expense operations
    // ========================

    /// List expenses, newest first.
    pub async fn list_expenses(&self, filter: ExpenseFilter) -> Result<Vec<Expense>, AppError> {
        let expenses = self.repo.list_expenses(filter.limit, filter.offset).await?;
        debug!(
            count = expenses.len(),
            limit = ?filter.limit,
            offset = filter.offset,
            "listed expenses"
        );
        Ok(expenses)
    }

    /// List every recorded expense, newest first.
    pub async fn list_all_expenses(&self) -> Result<Vec<Expense>, AppError> {
        self.list_expenses(ExpenseFilter::default()).await
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: &str) -> Result<Expense, AppError> {
        self.repo
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))
    }

    /// Record a new two-person expense from a creation payload.
    pub async fn create_expense(&self, new_expense: NewExpense) -> Result<Expense, AppError> {
        validate_description(&new_expense.description)?;
        validate_amount(new_expense.total)?;

        let pct = new_expense.payer_share_pct;
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            warn!(share = pct, "rejected expense share");
            return Err(AppError::InvalidShare(pct));
        }

        let users = self.repo.list_users().await?;
        if !users.iter().any(|u| u.id == new_expense.paid_by) {
            warn!(payer = %new_expense.paid_by, "rejected expense from unknown payer");
            return Err(AppError::UnknownUser(new_expense.paid_by));
        }
        let other = other_user(&users, &new_expense.paid_by)
            .ok_or_else(|| AppError::MissingCounterpart(new_expense.paid_by.clone()))?
            .id
            .clone();

        let today = Utc::now().date_naive();
        let expense = new_expense.into_expense(new_expense_id(), &other, today);
        self.repo.save_expense(&expense).await?;

        info!(
            id = %expense.id,
            amount = expense.amount,
            paid_by = %expense.paid_by,
            "recorded expense"
        );
        Ok(expense)
    }

    /// Check an already-built expense before storing it: non-empty description,
    /// positive amount and a known payer.
    pub async fn validate_expense(&self, expense: &Expense) -> Result<(), AppError> {
        validate_description(&expense.description)?;
        validate_amount(expense.amount)?;
        self.get_user(&expense.paid_by).await?;
        Ok(())
    }

    /// Store an already-built expense (e.g. from an import).
    pub async fn record_expense(&self, expense: &Expense) -> Result<(), AppError> {
        self.validate_expense(expense).await?;

        self.repo.save_expense(expense).await?;
        info!(id = %expense.id, amount = expense.amount, "stored expense");
        Ok(())
    }

    /// Returns true if an expense with this ID is already recorded.
    pub async fn expense_exists(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.repo.get_expense(id).await?.is_some())
    }

    /// Delete an expense permanently.
    pub async fn delete_expense(&self, id: &str) -> Result<(), AppError> {
        let removed = self.repo.delete_expense(id).await?;
        if removed == 0 {
            return Err(AppError::ExpenseNotFound(id.to_string()));
        }
        info!(id, "deleted expense");
        Ok(())
    }

    /// Number of recorded expenses.
    pub async fn count_expenses(&self) -> Result<i64, AppError> {
        Ok(self.repo.count_expenses().await?)
    }

    // ========================
    // Balance operations
    // ========================

    /// Compute the viewer's balance over the entire expense history.
    pub async fn get_balance(&self, viewer: &str) -> Result<Balance, AppError> {
        self.get_user(viewer).await?;
        let expenses = self.list_all_expenses().await?;
        let balance = compute_balance(viewer, &expenses);
        debug!(
            viewer,
            expenses = expenses.len(),
            net = balance.net,
            "computed balance"
        );
        Ok(balance)
    }

    /// List a page of expenses along with their effect on the viewer.
    pub async fn get_expense_views(
        &self,
        viewer: &str,
        filter: ExpenseFilter,
    ) -> Result<Vec<ExpenseView>, AppError> {
        self.get_user(viewer).await?;
        let users = self.repo.list_users().await?;
        let expenses = self.list_expenses(filter).await?;

        Ok(expenses
            .into_iter()
            .map(|expense| {
                let delta = round_to_cents(expense_delta(viewer, &expense));
                let relation = Relation::classify(viewer, &expense, delta);
                let payer_name = users
                    .iter()
                    .find(|u| u.id == expense.paid_by)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                ExpenseView {
                    expense,
                    payer_name,
                    delta,
                    relation,
                }
            })
            .collect())
    }
}

fn validate_description(description: &str) -> Result<(), AppError> {
    if description.trim().is_empty() {
        return Err(AppError::InvalidDescription(
            "Description must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_amount(amount: Amount) -> Result<(), AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::InvalidAmount(format!(
            "Amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}
