pub mod auth;
pub mod expense;
pub mod ledger;
pub mod types;

pub use auth::{RequestContext, StaticUserResolver, UserResolver};
pub use expense::{Expense, ExpensePatch, NewExpense};
pub use ledger::LedgerRow;
pub use types::{BlobId, CategoryId, ExpenseId, UserId};
