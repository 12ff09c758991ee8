//! Portfolio aggregation and the editable asset collection

use crate::coercion::{check_bounds, coerce_bounded, sanitize_numeric, sanitize_text};
use crate::error::AdvisorError;
use crate::models::{PortfolioItem, PortfolioSummary};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Conservative yearly return assumed when no assets are given (percent)
pub const DEFAULT_RETURN_RATE: f64 = 3.0;

const MAX_CURRENCY_AMOUNT: f64 = 999_999_999.0;
const MAX_RETURN_RATE: f64 = 100.0;
const ALLOCATION_TOLERANCE: f64 = 0.01;

/// Amount-weighted average return of `items`.
///
/// Normalizes by the actual sum of amounts, so partially filled or
/// non-normalized portfolios still weight correctly.
pub fn weighted_return(items: &[PortfolioItem]) -> PortfolioSummary {
    if items.is_empty() {
        return PortfolioSummary {
            weighted_return: DEFAULT_RETURN_RATE,
            total_invested: 0.0,
            used_default: true,
        };
    }

    let total_invested: f64 = items.iter().map(|item| item.amount).sum();
    let weighted_return = if total_invested == 0.0 {
        0.0
    } else {
        items
            .iter()
            .map(|item| item.amount * item.return_rate)
            .sum::<f64>()
            / total_invested
    };

    PortfolioSummary {
        weighted_return,
        total_invested,
        used_default: false,
    }
}

/// Percentage allocations must add up to 100.
pub fn validate_allocation(items: &[PortfolioItem]) -> Result<f64> {
    let total: f64 = items.iter().map(|item| item.amount).sum();
    if (total - 100.0).abs() > ALLOCATION_TOLERANCE {
        return Err(AdvisorError::AllocationMismatch(total));
    }
    Ok(total)
}

/// Every item must carry sane numbers before it feeds a calculation.
pub fn validate_items(items: &[PortfolioItem], kind: AmountKind) -> Result<()> {
    for item in items {
        check_bounds("amount", item.amount, 0.0, kind.max_amount())?;
        check_bounds("returnRate", item.return_rate, -MAX_RETURN_RATE, MAX_RETURN_RATE)?;
    }
    Ok(())
}

/// How the `amount` of an item is read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AmountKind {
    /// Money invested in the asset
    Currency,
    /// Share of the portfolio, 0..=100
    Percentage,
}

impl AmountKind {
    fn max_amount(&self) -> f64 {
        match self {
            AmountKind::Currency => MAX_CURRENCY_AMOUNT,
            AmountKind::Percentage => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ItemField {
    Name,
    Amount,
    ReturnRate,
}

/// Editable collection of assets. Owns its items; ids are generated on
/// insert and never handed out twice.
#[derive(Debug, Clone)]
pub struct Portfolio {
    kind: AmountKind,
    items: Vec<PortfolioItem>,
}

impl Portfolio {
    pub fn new(kind: AmountKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    pub fn from_items(kind: AmountKind, items: Vec<PortfolioItem>) -> Self {
        Self { kind, items }
    }

    pub fn kind(&self) -> AmountKind {
        self.kind
    }

    pub fn items(&self) -> &[PortfolioItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<PortfolioItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an empty asset and return its id.
    pub fn add_item(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        self.items.push(PortfolioItem {
            id: id.clone(),
            name: String::new(),
            amount: 0.0,
            return_rate: 0.0,
        });
        debug!(item_id = %id, count = self.items.len(), "Portfolio item added");
        id
    }

    pub fn remove_item(&mut self, id: &str) -> Result<PortfolioItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| AdvisorError::ItemNotFound(id.to_string()))?;
        Ok(self.items.remove(index))
    }

    /// Update one field from raw user text. A rejected value leaves the item
    /// untouched.
    pub fn update_item(&mut self, id: &str, field: ItemField, raw: &str) -> Result<()> {
        let max_amount = self.kind.max_amount();
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| AdvisorError::ItemNotFound(id.to_string()))?;

        match field {
            ItemField::Name => item.name = sanitize_text(raw),
            ItemField::Amount => {
                item.amount = coerce_bounded("amount", &sanitize_numeric(raw), 0.0, max_amount)?;
            }
            ItemField::ReturnRate => {
                item.return_rate = coerce_bounded(
                    "returnRate",
                    &sanitize_numeric(raw),
                    -MAX_RETURN_RATE,
                    MAX_RETURN_RATE,
                )?;
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> PortfolioSummary {
        weighted_return(&self.items)
    }
}
