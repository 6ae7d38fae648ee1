use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::{Expense, User, UserId};

use super::MIGRATION_001_INITIAL;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Repository for persisting and querying users and expenses.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        debug!("migrations applied");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // User operations
    // ========================

    /// Insert users that don't exist yet. Existing users keep their names.
    pub async fn seed_users(&self, users: &[User]) -> Result<()> {
        for user in users {
            sqlx::query("INSERT OR IGNORE INTO users (id, name) VALUES (?, ?)")
                .bind(&user.id)
                .bind(&user.name)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to seed user {}", user.id))?;
            debug!(id = %user.id, name = %user.name, "seeded user");
        }
        Ok(())
    }

    /// List all users, ordered by id.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, name FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        Ok(rows
            .iter()
            .map(|row| User {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    // ========================
    // Expense operations
    // ========================

    /// Save a new expense to the database.
    pub async fn save_expense(&self, expense: &Expense) -> Result<()> {
        let participants_json = serde_json::to_string(&expense.participants)?;
        let shares_json = expense
            .shares
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, description, amount, date, paid_by, participants, shares)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(expense.date.format(DATE_FORMAT).to_string())
        .bind(&expense.paid_by)
        .bind(&participants_json)
        .bind(&shares_json)
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;

        Ok(())
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: &str) -> Result<Option<Expense>> {
        let row = sqlx::query(
            r#"
            SELECT id, description, amount, date, paid_by, participants, shares
            FROM expenses
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_expense(&row)?)),
            None => Ok(None),
        }
    }

    /// List expenses, newest first. Without a limit the whole history is returned.
    pub async fn list_expenses(&self, limit: Option<usize>, offset: usize) -> Result<Vec<Expense>> {
        let mut query = String::from(
            "SELECT id, description, amount, date, paid_by, participants, shares FROM expenses ORDER BY date DESC, id DESC",
        );

        // SQLite only accepts OFFSET after a LIMIT; -1 means no limit
        match (limit, offset) {
            (Some(lim), 0) => query.push_str(&format!(" LIMIT {}", lim)),
            (Some(lim), off) => query.push_str(&format!(" LIMIT {} OFFSET {}", lim, off)),
            (None, 0) => {}
            (None, off) => query.push_str(&format!(" LIMIT -1 OFFSET {}", off)),
        }

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Delete an expense. Returns the number of rows removed (0 or 1).
    pub async fn delete_expense(&self, id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;
        Ok(result.rows_affected())
    }

    /// Count all recorded expenses.
    pub async fn count_expenses(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM expenses")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count expenses")?;
        Ok(row.get("count"))
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let date_str: String = row.get("date");
        let participants_json: String = row.get("participants");
        let shares_json: Option<String> = row.get("shares");

        let participants: BTreeSet<UserId> =
            serde_json::from_str(&participants_json).context("Invalid participants JSON")?;
        let shares: Option<BTreeMap<UserId, f64>> = shares_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .context("Invalid shares JSON")?;

        Ok(Expense {
            id: row.get("id"),
            description: row.get("description"),
            amount: row.get("amount"),
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .context("Invalid expense date")?,
            paid_by: row.get("paid_by"),
            participants,
            shares,
        })
    }
}
