//! Events reported by the gateway service.
//!
//! The gateway never decides how loudly something is logged. It returns
//! these events to its caller, which forwards them to whatever observability
//! collaborator the host uses.

use crate::{OrderStatus, PaymentOutcome};
use serde::{Deserialize, Serialize};

/// Event produced while preparing a payment or handling a callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
	/// A signed bank request was produced for an order.
	RedirectIssued {
		gateway: String,
		order_id: String,
		reference: String,
	},
	/// The order was marked paid.
	PaymentConfirmed {
		gateway: String,
		order_id: String,
		transaction_id: Option<String>,
	},
	/// The bank reported the payment as pending.
	PaymentPending { gateway: String, order_id: String },
	/// The payment was cancelled.
	PaymentCancelled { gateway: String, order_id: String },
	/// A callback was rejected and the order left untouched.
	CallbackRejected {
		gateway: String,
		outcome: PaymentOutcome,
		stamp: Option<String>,
		reason: String,
	},
	/// A repeated callback found the order already in the reported status.
	DuplicateCallback {
		gateway: String,
		order_id: String,
		status: OrderStatus,
	},
	/// The Order Store refused a status change.
	TransitionRefused {
		gateway: String,
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
	},
}

impl GatewayEvent {
	/// Returns true for events that indicate a possible forgery attempt.
	pub fn is_security_relevant(&self) -> bool {
		matches!(
			self,
			GatewayEvent::CallbackRejected {
				outcome: PaymentOutcome::InvalidSignature,
				..
			}
		)
	}
}
