//! The monthly aggregation engine: groups a user's debit expenses by
//! calendar month with decimal-exact totals.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    expense::core::{EXPENSE_COLUMNS, Expense, map_expense_row},
};

/// Month names indexed by month number minus one.
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// The aggregated total and transaction list for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    /// A human-readable label for the month, e.g. "March 2025".
    pub month: String,
    /// The exact sum of the amounts of the member transactions.
    pub total_amount: Decimal,
    /// The member transactions.
    pub transactions: Vec<Expense>,
}

/// Group the debit expenses of `user_id` by calendar month, most recent
/// month first.
///
/// Amounts are summed with decimal arithmetic, so totals are exact rather
/// than subject to binary floating-point drift. A user with no debit
/// expenses yields an empty list.
///
/// # Errors
/// This function will return an error if there was an error trying to access
/// the store.
pub fn monthly_totals(user_id: UserID, connection: &Connection) -> Result<Vec<MonthSummary>, Error> {
    // Fetching in descending date order means each month's expenses are
    // contiguous and the months come out most recent first.
    let expenses = connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense \
            WHERE user_id = :user_id AND category = 'debit' \
            ORDER BY date DESC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_expense_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut summaries: Vec<(i32, u8, MonthSummary)> = Vec::new();

    for expense in expenses {
        let year = expense.date.year();
        let month = u8::from(expense.date.month());

        let summary = match summaries.last_mut() {
            Some((current_year, current_month, summary))
                if *current_year == year && *current_month == month =>
            {
                summary
            }
            _ => {
                summaries.push((
                    year,
                    month,
                    MonthSummary {
                        month: month_label(year, month),
                        total_amount: Decimal::ZERO,
                        transactions: Vec::new(),
                    },
                ));
                &mut summaries.last_mut().expect("summary just added").2
            }
        };

        summary.total_amount += expense.amount;
        summary.transactions.push(expense);
    }

    Ok(summaries.into_iter().map(|(_, _, summary)| summary).collect())
}

fn month_label(year: i32, month: u8) -> String {
    format!("{} {year}", MONTH_NAMES[(month - 1) as usize])
}

/// A route handler for the monthly debit expense report.
pub async fn monthly_expenses_endpoint(
    State(state): State<crate::AppState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let summaries = monthly_totals(user_id, &connection)?;

    Ok(Json(summaries).into_response())
}

#[cfg(test)]
mod monthly_tests {
    use rust_decimal::Decimal;
    use time::macros::datetime;

    use crate::expense::core::test_utils::{
        create_test_user, get_test_connection, insert_expense,
    };

    use super::{monthly_totals, month_label};

    #[test]
    fn no_expenses_yields_empty_list() {
        let connection = get_test_connection();
        let user_id = create_test_user("test@example.com", &connection);

        let summaries = monthly_totals(user_id, &connection).unwrap();

        assert!(summaries.is_empty());
    }

    #[test]
    fn non_debit_expenses_are_excluded() {
        let connection = get_test_connection();
        let user_id = create_test_user("test@example.com", &connection);

        insert_expense(user_id, "credit", "100", datetime!(2024-03-15 10:30 UTC), &connection);
        insert_expense(user_id, "unknown", "50", datetime!(2024-03-16 10:30 UTC), &connection);

        let summaries = monthly_totals(user_id, &connection).unwrap();

        assert!(summaries.is_empty());
    }

    #[test]
    fn groups_are_ordered_most_recent_first() {
        let connection = get_test_connection();
        let user_id = create_test_user("test@example.com", &connection);

        insert_expense(user_id, "debit", "50", datetime!(2024-03-15 00:00 UTC), &connection);
        insert_expense(user_id, "debit", "20", datetime!(2024-04-01 00:00 UTC), &connection);

        let summaries = monthly_totals(user_id, &connection).unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].month, "April 2024");
        assert_eq!(summaries[0].total_amount, Decimal::from(20));
        assert_eq!(summaries[1].month, "March 2024");
        assert_eq!(summaries[1].total_amount, Decimal::from(50));
    }

    #[test]
    fn december_sorts_before_january_of_the_next_year() {
        let connection = get_test_connection();
        let user_id = create_test_user("test@example.com", &connection);

        insert_expense(user_id, "debit", "10", datetime!(2024-12-31 23:59 UTC), &connection);
        insert_expense(user_id, "debit", "20", datetime!(2025-01-01 00:01 UTC), &connection);

        let summaries = monthly_totals(user_id, &connection).unwrap();

        assert_eq!(summaries[0].month, "January 2025");
        assert_eq!(summaries[1].month, "December 2024");
    }

    #[test]
    fn totals_are_decimal_exact() {
        let connection = get_test_connection();
        let user_id = create_test_user("test@example.com", &connection);

        // 0.1 + 0.2 + 0.3 drifts with binary floats, not with decimals.
        insert_expense(user_id, "debit", "0.1", datetime!(2024-03-01 00:00 UTC), &connection);
        insert_expense(user_id, "debit", "0.2", datetime!(2024-03-02 00:00 UTC), &connection);
        insert_expense(user_id, "debit", "0.3", datetime!(2024-03-03 00:00 UTC), &connection);

        let summaries = monthly_totals(user_id, &connection).unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_amount, "0.6".parse().unwrap());
    }

    #[test]
    fn summary_contains_member_transactions() {
        let connection = get_test_connection();
        let user_id = create_test_user("test@example.com", &connection);

        let first = insert_expense(user_id, "debit", "1", datetime!(2024-03-01 00:00 UTC), &connection);
        let second = insert_expense(user_id, "debit", "2", datetime!(2024-03-02 00:00 UTC), &connection);

        let summaries = monthly_totals(user_id, &connection).unwrap();

        let ids: Vec<_> = summaries[0]
            .transactions
            .iter()
            .map(|expense| expense.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn other_users_expenses_are_excluded() {
        let connection = get_test_connection();
        let owner = create_test_user("owner@example.com", &connection);
        let other = create_test_user("other@example.com", &connection);

        insert_expense(other, "debit", "100", datetime!(2024-03-15 10:30 UTC), &connection);

        let summaries = monthly_totals(owner, &connection).unwrap();

        assert!(summaries.is_empty());
    }

    #[test]
    fn month_labels_cover_the_whole_year() {
        assert_eq!(month_label(2025, 1), "January 2025");
        assert_eq!(month_label(2025, 6), "June 2025");
        assert_eq!(month_label(2025, 12), "December 2025");
    }
}
