use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, UserId};

pub type ExpenseId = String;

/// A shared expense: someone fronted `amount`, and `participants` share the cost.
/// Expenses are immutable once recorded; corrections are a delete plus a new expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    /// Whole expense total (always positive for recorded expenses)
    pub amount: Amount,
    /// Calendar date, no time component
    pub date: NaiveDate,
    /// Who fronted the money. Not required to be a participant.
    pub paid_by: UserId,
    /// Users sharing the cost
    #[serde(default)]
    pub participants: BTreeSet<UserId>,
    /// Explicit fractions in [0, 1]. Missing users default to the equal split rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<BTreeMap<UserId, f64>>,
}

impl Expense {
    pub fn new(
        id: impl Into<ExpenseId>,
        description: impl Into<String>,
        amount: Amount,
        date: NaiveDate,
        paid_by: impl Into<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            amount,
            date,
            paid_by: paid_by.into(),
            participants: BTreeSet::new(),
            shares: None,
        }
    }

    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shares<I, S>(mut self, shares: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<UserId>,
    {
        self.shares = Some(shares.into_iter().map(|(u, s)| (u.into(), s)).collect());
        self
    }

    pub fn is_payer(&self, user: &str) -> bool {
        self.paid_by == user
    }

    pub fn is_participant(&self, user: &str) -> bool {
        self.participants.contains(user)
    }

    /// Number of people the amount is split between when no explicit share applies.
    /// Never zero, so an empty participant set divides by one.
    pub fn participant_count(&self) -> usize {
        self.participants.len().max(1)
    }

    /// Explicit share for `user`, if the expense carries one.
    pub fn explicit_share(&self, user: &str) -> Option<f64> {
        self.shares.as_ref().and_then(|s| s.get(user).copied())
    }
}

/// Generate a fresh expense identifier.
pub fn new_expense_id() -> ExpenseId {
    format!("e_{}", Uuid::new_v4().simple())
}

/// Creation payload for a two-person expense, as entered by a person.
/// Validation happens in the application layer before an `Expense` is built.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub description: String,
    pub total: Amount,
    pub paid_by: UserId,
    /// The payer's own share, in percent (0..=100). The other person takes the rest.
    pub payer_share_pct: f64,
    /// Defaults to today when absent
    pub date: Option<NaiveDate>,
}

impl NewExpense {
    pub fn new(description: impl Into<String>, total: Amount, paid_by: impl Into<UserId>) -> Self {
        Self {
            description: description.into(),
            total,
            paid_by: paid_by.into(),
            payer_share_pct: 50.0,
            date: None,
        }
    }

    pub fn with_payer_share(mut self, pct: f64) -> Self {
        self.payer_share_pct = pct;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Build the recorded expense: both people participate and the percentage
    /// becomes explicit share fractions, rounded to three decimals.
    pub fn into_expense(self, id: ExpenseId, other: &str, today: NaiveDate) -> Expense {
        let payer_share = round_fraction(self.payer_share_pct / 100.0);
        let other_share = round_fraction((100.0 - self.payer_share_pct) / 100.0);
        let paid_by = self.paid_by;

        Expense::new(
            id,
            self.description,
            self.total,
            self.date.unwrap_or(today),
            paid_by.clone(),
        )
        .with_participants([paid_by.clone(), other.to_string()])
        .with_shares([(paid_by, payer_share), (other.to_string(), other_share)])
    }
}

fn round_fraction(fraction: f64) -> f64 {
    (fraction * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_participants_are_a_set() {
        let expense = Expense::new("e1", "Dinner", 96.0, date("2025-12-01"), "u1")
            .with_participants(["u1", "u2", "u1"]);

        assert_eq!(expense.participants.len(), 2);
        assert_eq!(expense.participant_count(), 2);
        assert!(expense.is_participant("u1"));
        assert!(expense.is_payer("u1"));
        assert!(!expense.is_payer("u2"));
    }

    #[test]
    fn test_participant_count_never_zero() {
        let expense = Expense::new("e1", "Gift", 20.0, date("2025-12-01"), "u1");
        assert_eq!(expense.participant_count(), 1);
    }

    #[test]
    fn test_explicit_share() {
        let expense = Expense::new("e2", "Cab", 42.5, date("2025-12-02"), "u2")
            .with_participants(["u1", "u2"])
            .with_shares([("u2", 0.7), ("u1", 0.3)]);

        assert_eq!(expense.explicit_share("u1"), Some(0.3));
        assert_eq!(expense.explicit_share("u3"), None);
    }

    #[test]
    fn test_new_expense_into_expense() {
        let expense = NewExpense::new("Coffee run", 12.0, "u1")
            .with_payer_share(60.0)
            .into_expense("e4".into(), "u2", date("2025-12-04"));

        assert_eq!(expense.id, "e4");
        assert_eq!(expense.date, date("2025-12-04"));
        assert!(expense.is_participant("u1"));
        assert!(expense.is_participant("u2"));
        assert_eq!(expense.explicit_share("u1"), Some(0.6));
        assert_eq!(expense.explicit_share("u2"), Some(0.4));
    }

    #[test]
    fn test_new_expense_rounds_shares_to_three_decimals() {
        let expense = NewExpense::new("Taxi", 30.0, "u2")
            .with_payer_share(100.0 / 3.0)
            .with_date(date("2025-01-10"))
            .into_expense("e9".into(), "u1", date("2025-12-04"));

        assert_eq!(expense.date, date("2025-01-10"));
        assert_eq!(expense.explicit_share("u2"), Some(0.333));
        assert_eq!(expense.explicit_share("u1"), Some(0.667));
    }

    #[test]
    fn test_serde_uses_camel_case_and_omits_missing_shares() {
        let expense = Expense::new("e1", "Dinner", 96.0, date("2025-12-01"), "u1")
            .with_participants(["u1", "u2"]);
        let json = serde_json::to_value(&expense).unwrap();

        assert_eq!(json["paidBy"], "u1");
        assert_eq!(json["date"], "2025-12-01");
        assert!(json.get("shares").is_none());

        let back: Expense = serde_json::from_value(json).unwrap();
        assert_eq!(back, expense);
    }

    #[test]
    fn test_new_expense_id_is_unique() {
        let a = new_expense_id();
        let b = new_expense_id();
        assert!(a.starts_with("e_"));
        assert_ne!(a, b);
    }
}
