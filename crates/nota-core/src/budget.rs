use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// One recorded club expense. `amount` is in won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: String,

    pub club_name: String,

    /// `YYYY-MM`; expenses without one only show when no month is chosen.
    #[serde(default)]
    pub month: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: i64,

    #[serde(default)]
    pub note: String,
}

/// Numbers, numeric strings and anything else (as zero).
fn lenient_amount<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let amount = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .unwrap_or(0),
        _ => 0,
    };
    Ok(amount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetSummary<'a> {
    pub club_name: String,
    pub month: Option<String>,
    pub expenses: Vec<&'a Expense>,
    pub total: i64,
}

impl BudgetSummary<'_> {
    pub fn count(&self) -> usize {
        self.expenses.len()
    }
}

/// Distinct expense months, newest first.
pub fn expense_months(expenses: &[Expense]) -> Vec<String> {
    let months: BTreeSet<&str> = expenses
        .iter()
        .filter_map(|expense| expense.month.as_deref())
        .filter(|month| !month.is_empty())
        .collect();
    months.into_iter().rev().map(str::to_string).collect()
}

/// Expenses of one club, optionally narrowed to a single month, with their
/// count and total.
#[tracing::instrument(skip(expenses), fields(total_expenses = expenses.len()))]
pub fn budget_summary<'a>(
    expenses: &'a [Expense],
    club_name: &str,
    month: Option<&str>,
) -> BudgetSummary<'a> {
    let matched: Vec<&Expense> = expenses
        .iter()
        .filter(|expense| expense.club_name == club_name)
        .filter(|expense| month.is_none_or(|wanted| expense.month.as_deref() == Some(wanted)))
        .collect();
    let total: i64 = matched.iter().map(|expense| expense.amount).sum();
    debug!(count = matched.len(), total, "summarised club budget");

    BudgetSummary {
        club_name: club_name.to_string(),
        month: month.map(str::to_string),
        expenses: matched,
        total,
    }
}

/// `80000` -> `80,000원`.
pub fn format_won(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped}원")
}
