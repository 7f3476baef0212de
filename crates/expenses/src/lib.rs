pub mod error;
pub mod service;
mod validate;

pub use error::ExpenseError;
pub use service::{ExpenseInput, ExpenseService};
