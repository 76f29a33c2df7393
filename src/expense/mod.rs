//! Expense tracking: the data model and queries, the JSON CRUD endpoints,
//! the sync engine and the monthly aggregation engine.

mod core;
mod endpoints;
mod monthly;
mod sync;

pub use core::{Expense, ExpenseChanges, ExpenseId, NewExpense, create_expense_table};
pub use endpoints::{
    CreateExpenseBody, create_expense_endpoint, delete_expense_endpoint, get_expense_endpoint,
    get_expenses_endpoint, update_expense_endpoint,
};
pub use monthly::{MonthSummary, monthly_expenses_endpoint, monthly_totals};
pub use sync::{
    RawTimestamp, RawTransaction, SkippedTransaction, SyncOutcome, SyncRequest, SyncResponse,
    sync_expenses_endpoint, sync_transactions,
};
