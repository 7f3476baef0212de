use chrono::NaiveDate;

use crate::error::ExpenseError;
use crate::service::ExpenseInput;

const MERCHANT_MAX_LEN: usize = 200;
const COMMENT_MAX_LEN: usize = 1000;

/// Field values that passed validation, normalized for storage.
#[derive(Debug)]
pub(crate) struct ValidatedFields {
    pub date: NaiveDate,
    pub merchant: String,
    /// Whitespace-only comments normalize to `None`.
    pub comment: Option<String>,
}

pub(crate) fn validate(input: &ExpenseInput) -> Result<ValidatedFields, ExpenseError> {
    // Round-tripping the parse enforces zero-padded YYYY-MM-DD exactly;
    // chrono alone would also accept "2026-3-4".
    let date = NaiveDate::parse_from_str(&input.date, "%Y-%m-%d")
        .ok()
        .filter(|d| d.format("%Y-%m-%d").to_string() == input.date)
        .ok_or_else(|| {
            ExpenseError::Validation("Invalid date. Expected a valid YYYY-MM-DD date.".into())
        })?;

    if input.amount_cents <= 0 {
        return Err(ExpenseError::Validation(
            "Amount must be a positive integer (cents).".into(),
        ));
    }

    let merchant = input.merchant.trim();
    if merchant.is_empty() {
        return Err(ExpenseError::Validation("Merchant name is required.".into()));
    }
    if merchant.chars().count() > MERCHANT_MAX_LEN {
        return Err(ExpenseError::Validation(
            "Merchant name must be 200 characters or less.".into(),
        ));
    }

    let comment = input
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(comment) = comment
        && comment.chars().count() > COMMENT_MAX_LEN
    {
        return Err(ExpenseError::Validation(
            "Comment must be 1000 characters or less.".into(),
        ));
    }

    Ok(ValidatedFields {
        date,
        merchant: merchant.to_owned(),
        comment: comment.map(str::to_owned),
    })
}
