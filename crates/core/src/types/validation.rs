//! Pre-submission validation of product input.
//!
//! Rules are evaluated in table order. A create or update must not be
//! attempted while any rule is violated.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::product::ProductInput;

/// Input field a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Category,
    Price,
    Quantity,
}

impl Field {
    /// Field name as used in the wire format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Category => "category",
            Self::Price => "price",
            Self::Quantity => "quantity",
        }
    }
}

/// A violated validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ValidationError {
    /// Offending field.
    pub field: Field,
    /// Human-readable message for that rule.
    pub message: &'static str,
}

struct Rule {
    field: Field,
    holds: fn(&ProductInput) -> bool,
    message: &'static str,
}

const RULES: [Rule; 4] = [
    Rule {
        field: Field::Name,
        holds: name_present,
        message: "Product name is required",
    },
    Rule {
        field: Field::Category,
        holds: category_present,
        message: "Product category is required",
    },
    Rule {
        field: Field::Price,
        holds: price_positive,
        message: "Price must be greater than zero",
    },
    Rule {
        field: Field::Quantity,
        holds: quantity_non_negative,
        message: "Quantity cannot be negative",
    },
];

fn name_present(input: &ProductInput) -> bool {
    !input.name.trim().is_empty()
}

fn category_present(input: &ProductInput) -> bool {
    !input.category.trim().is_empty()
}

fn price_positive(input: &ProductInput) -> bool {
    input.price > Decimal::ZERO
}

const fn quantity_non_negative(input: &ProductInput) -> bool {
    input.quantity >= 0
}

impl Rule {
    const fn error(&self) -> ValidationError {
        ValidationError {
            field: self.field,
            message: self.message,
        }
    }
}

/// Check `input` against every rule, stopping at the first violation.
///
/// # Errors
///
/// Returns the first violated rule in table order.
pub fn validate(input: &ProductInput) -> Result<(), ValidationError> {
    match RULES.iter().find(|rule| !(rule.holds)(input)) {
        Some(rule) => Err(rule.error()),
        None => Ok(()),
    }
}

/// Every violated rule, in table order.
#[must_use]
pub fn violations(input: &ProductInput) -> Vec<ValidationError> {
    RULES
        .iter()
        .filter(|rule| !(rule.holds)(input))
        .map(Rule::error)
        .collect()
}
