//! Discount codes.
//!
//! Rules are static configuration: the storefront loads them once at startup
//! (the defaults below, or a YAML file) and never mutates them. Codes match
//! case-insensitively. Whether a rule's minimum subtotal is met is decided when
//! the discount is computed, not when the code is applied, so an applied code
//! can contribute nothing until the cart grows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a rule reduces the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` percent of the subtotal.
    Percentage,
    /// A flat `value`, never more than the subtotal.
    Fixed,
}

/// A named discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    /// Subtotal below which the rule yields nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    /// Upper bound on the computed discount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<Decimal>,
}

impl DiscountRule {
    /// Percentage rule with no threshold or cap.
    #[must_use]
    pub fn percentage(code: impl Into<String>, percent: Decimal) -> Self {
        Self {
            code: code.into(),
            kind: DiscountKind::Percentage,
            value: percent,
            min_amount: None,
            max_discount: None,
        }
    }

    /// Fixed-amount rule with no threshold or cap.
    #[must_use]
    pub fn fixed(code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            code: code.into(),
            kind: DiscountKind::Fixed,
            value: amount,
            min_amount: None,
            max_discount: None,
        }
    }

    /// Require a minimum subtotal.
    #[must_use]
    pub const fn with_min_amount(mut self, min_amount: Decimal) -> Self {
        self.min_amount = Some(min_amount);
        self
    }

    /// Cap the discount.
    #[must_use]
    pub const fn with_max_discount(mut self, max_discount: Decimal) -> Self {
        self.max_discount = Some(max_discount);
        self
    }

    /// Whether `code` names this rule (case-insensitive).
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        self.code.to_lowercase() == code.trim().to_lowercase()
    }

    /// Discount this rule grants on `subtotal`.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if self.min_amount.is_some_and(|min| subtotal < min) {
            return Decimal::ZERO;
        }

        let raw = match self.kind {
            DiscountKind::Percentage => subtotal * self.value / Decimal::ONE_HUNDRED,
            DiscountKind::Fixed => self.value.min(subtotal),
        };

        let capped = self.max_discount.map_or(raw, |cap| raw.min(cap));
        capped.max(Decimal::ZERO)
    }
}

/// The configured set of discount rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountRules(Vec<DiscountRule>);

impl DiscountRules {
    /// Wrap an explicit list of rules.
    #[must_use]
    pub const fn new(rules: Vec<DiscountRule>) -> Self {
        Self(rules)
    }

    /// Look up a rule by code.
    #[must_use]
    pub fn find(&self, code: &str) -> Option<&DiscountRule> {
        self.0.iter().find(|rule| rule.matches(code))
    }

    /// Whether `code` is a configured code.
    #[must_use]
    pub fn is_valid(&self, code: &str) -> bool {
        self.find(code).is_some()
    }

    /// Discount for `subtotal` under the active `code`.
    ///
    /// No code, or a code that names no rule, yields zero.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal, code: Option<&str>) -> Decimal {
        code.and_then(|code| self.find(code))
            .map_or(Decimal::ZERO, |rule| rule.discount_for(subtotal))
    }

    /// Iterate over the rules.
    pub fn iter(&self) -> impl Iterator<Item = &DiscountRule> {
        self.0.iter()
    }

    /// Number of configured rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no rules are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for DiscountRules {
    /// The codes printed on the kiosk flyers.
    fn default() -> Self {
        Self(vec![
            DiscountRule::percentage("POPCORN10", Decimal::from(10)),
            DiscountRule::percentage("AMPOPCORN", Decimal::from(15)),
            DiscountRule::percentage("PRIMERA-COMPRA", Decimal::from(35)),
        ])
    }
}
