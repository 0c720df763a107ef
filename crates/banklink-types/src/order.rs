//! Order types for the banklink gateway.
//!
//! An order is owned by the Order Store; the gateway reads its amount,
//! currency and identifiers to build a bank request and mutates only its
//! payment status.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A shop order awaiting banklink payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Order identifier. Used as the bank stamp and must consist of ASCII digits.
	pub id: String,
	/// Human-facing order number shown in the payment description.
	pub number: String,
	/// Order total in minor currency units.
	pub amount: u64,
	/// ISO 4217 currency code.
	pub currency: String,
	/// Current payment status.
	pub status: OrderStatus,
	/// Buyer language (ISO 639-1 or a locale such as `et_EE`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
	/// Buyer billing country (ISO 3166-1 alpha-2).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub billing_country: Option<String>,
	/// Page hosting the auto-submitting bank form.
	pub checkout_url: String,
	/// Where the buyer lands after a successful payment.
	pub return_url: String,
	/// Where the buyer lands after a cancelled or rejected payment.
	pub cancel_url: String,
	/// Bank transaction number, recorded once the order is paid.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bank_transaction: Option<String>,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp when this order was last updated.
	pub updated_at: u64,
}

impl Order {
	/// Creates a new order in the `Created` state.
	pub fn new(id: impl Into<String>, amount: u64, currency: impl Into<String>) -> Self {
		let id = id.into();
		let now = crate::current_timestamp();
		Self {
			number: id.clone(),
			id,
			amount,
			currency: currency.into(),
			status: OrderStatus::Created,
			language: None,
			billing_country: None,
			checkout_url: String::new(),
			return_url: String::new(),
			cancel_url: String::new(),
			bank_transaction: None,
			created_at: now,
			updated_at: now,
		}
	}
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order exists but no bank redirect has been issued.
	Created,
	/// A signed request was handed to the buyer's browser.
	RedirectIssued,
	/// The bank reported the payment as not yet settled.
	Pending,
	/// The bank confirmed the payment. Terminal.
	Paid,
	/// The buyer or the bank cancelled the payment.
	Cancelled,
}

impl OrderStatus {
	/// Checks whether moving from this status to `next` is allowed.
	///
	/// Staying in the same status is never a transition; callers treat it
	/// as a no-op instead.
	pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
		ORDER_TRANSITIONS
			.get(self)
			.is_some_and(|allowed| allowed.contains(next))
	}
}

// Static transition table - each status maps to the statuses it may move to.
static ORDER_TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Created,
		HashSet::from([OrderStatus::RedirectIssued, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::RedirectIssued,
		HashSet::from([
			OrderStatus::Pending,
			OrderStatus::Paid,
			OrderStatus::Cancelled,
		]),
	);
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::Paid, OrderStatus::Cancelled]),
	);
	// A cancelled order may be paid again through a fresh redirect.
	m.insert(
		OrderStatus::Cancelled,
		HashSet::from([OrderStatus::RedirectIssued]),
	);
	m.insert(OrderStatus::Paid, HashSet::new()); // terminal
	m
});

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Created => write!(f, "Created"),
			OrderStatus::RedirectIssued => write!(f, "RedirectIssued"),
			OrderStatus::Pending => write!(f, "Pending"),
			OrderStatus::Paid => write!(f, "Paid"),
			OrderStatus::Cancelled => write!(f, "Cancelled"),
		}
	}
}

/// Result of asking the Order Store to set a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
	/// The status was written; `from` is the previous status.
	Applied { from: OrderStatus },
	/// The order already had the requested status; nothing was written.
	Unchanged,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_paid_has_no_way_out() {
		assert!(!OrderStatus::Paid.can_transition_to(&OrderStatus::Cancelled));
		assert!(!OrderStatus::Paid.can_transition_to(&OrderStatus::RedirectIssued));
	}

	#[test]
	fn test_redirect_can_reach_every_bank_outcome() {
		let from = OrderStatus::RedirectIssued;
		assert!(from.can_transition_to(&OrderStatus::Paid));
		assert!(from.can_transition_to(&OrderStatus::Pending));
		assert!(from.can_transition_to(&OrderStatus::Cancelled));
		assert!(!from.can_transition_to(&OrderStatus::Created));
	}

	#[test]
	fn test_same_status_is_not_a_transition() {
		assert!(!OrderStatus::Pending.can_transition_to(&OrderStatus::Pending));
		assert!(!OrderStatus::RedirectIssued.can_transition_to(&OrderStatus::RedirectIssued));
	}

	#[test]
	fn test_cancelled_order_can_be_retried() {
		assert!(OrderStatus::Cancelled.can_transition_to(&OrderStatus::RedirectIssued));
		assert!(!OrderStatus::Cancelled.can_transition_to(&OrderStatus::Paid));
	}

	#[test]
	fn test_status_serializes_snake_case() {
		let json = serde_json::to_string(&OrderStatus::RedirectIssued).unwrap();
		assert_eq!(json, "\"redirect_issued\"");
	}
}
