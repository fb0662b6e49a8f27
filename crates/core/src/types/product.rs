//! Catalog product records.
//!
//! [`Product`] is what the remote service stores and returns; [`ProductInput`]
//! is the payload sent when creating or updating one.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::id::ProductId;

/// A product record as known by the remote catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Server-assigned identity (negative while speculative).
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Free-form description, may be empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// Category label.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    /// Unit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Units in stock.
    pub quantity: i64,
}

/// Fields of a product without its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i64,
}

impl ProductInput {
    /// Create an input with an empty description.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price: Decimal,
        quantity: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: category.into(),
            price,
            quantity,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Product {
    /// Build a record from an id and the submitted fields.
    #[must_use]
    pub fn from_input(id: ProductId, input: ProductInput) -> Self {
        Self {
            id,
            name: input.name,
            description: input.description,
            category: input.category,
            price: input.price,
            quantity: input.quantity,
        }
    }

    /// The editable fields of this record, e.g. to prefill an edit form.
    #[must_use]
    pub fn to_input(&self) -> ProductInput {
        ProductInput {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

/// Case-insensitive substring match on name or category.
///
/// An empty (or whitespace-only) term matches every product.
#[must_use]
pub fn matches_search(product: &Product, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    product.name.to_lowercase().contains(&term) || product.category.to_lowercase().contains(&term)
}

/// Products matching `term`, in their original order.
#[must_use]
pub fn filter_products<'a>(products: &'a [Product], term: &str) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|product| matches_search(product, term))
        .collect()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
