//! Balance computation for two people sharing expenses.
//!
//! This is the single place where the balance rule lives. The store, the CLI
//! listing and the offline preview all call into it instead of re-deriving it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Amount, Expense, ExpenseId, round_to_cents};

/// A share fraction this close to 1.0 counts as the whole expense.
pub const FULL_SHARE_TOLERANCE: f64 = 1e-9;

/// Net position of one viewer across a list of expenses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Positive: the viewer is owed money. Negative: the viewer owes money.
    pub net: Amount,
    /// Each expense's rounded contribution to `net`
    pub by_expense: BTreeMap<ExpenseId, Amount>,
}

impl Balance {
    pub fn is_settled(&self) -> bool {
        self.net == 0.0
    }

    /// Rounded delta recorded for an expense, zero when the expense is unknown.
    pub fn delta_for(&self, expense_id: &str) -> Amount {
        self.by_expense.get(expense_id).copied().unwrap_or(0.0)
    }
}

/// Fraction of `expense` attributed to `viewer`.
///
/// An explicit share wins; otherwise participants split equally and everyone
/// else gets nothing.
pub fn share_fraction(viewer: &str, expense: &Expense) -> f64 {
    match expense.explicit_share(viewer) {
        Some(fraction) => fraction,
        None if expense.is_participant(viewer) => 1.0 / expense.participant_count() as f64,
        None => 0.0,
    }
}

/// Unrounded effect of one expense on the viewer's balance.
///
/// Rules, first match wins:
/// 1. a full share makes the whole amount the viewer's debt, whoever paid
/// 2. payer and participant is owed everything but their own share
/// 3. payer only is owed the whole amount
/// 4. participant only owes their share
/// 5. otherwise the expense does not touch the viewer
pub fn expense_delta(viewer: &str, expense: &Expense) -> Amount {
    let fraction = share_fraction(viewer, expense);
    let share_amount = expense.amount * fraction;
    let is_payer = expense.is_payer(viewer);
    let is_participant = expense.is_participant(viewer);

    if (fraction - 1.0).abs() < FULL_SHARE_TOLERANCE {
        -expense.amount
    } else if is_payer && is_participant {
        expense.amount - share_amount
    } else if is_payer {
        expense.amount
    } else if is_participant {
        -share_amount
    } else {
        0.0
    }
}

/// Compute the viewer's balance over the given expenses.
///
/// Never fails: malformed expenses fall back to the share rules above.
/// `net` accumulates unrounded deltas and is rounded once at the end, so it can
/// differ by a few cents from the sum of the rounded `by_expense` values.
pub fn compute_balance(viewer: &str, expenses: &[Expense]) -> Balance {
    let mut net = 0.0;
    let mut by_expense = BTreeMap::new();

    for expense in expenses {
        let delta = expense_delta(viewer, expense);
        net += delta;
        by_expense.insert(expense.id.clone(), round_to_cents(delta));
    }

    Balance {
        net: round_to_cents(net),
        by_expense,
    }
}
