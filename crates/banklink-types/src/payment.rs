//! Payment request, response and verification types.
//!
//! These values are transient: a request is built per checkout attempt and
//! a response is parsed once per bank callback. Neither is persisted.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Flat string field map as posted to or received from a bank.
pub type FieldMap = BTreeMap<String, String>;

/// Everything needed to build one outbound bank request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequest {
	/// Order identifier sent as the bank stamp.
	pub stamp: String,
	/// Stamp with its checksum digit appended.
	pub reference: String,
	/// Amount in minor currency units.
	pub amount: u64,
	/// ISO 4217 currency code.
	pub currency: String,
	/// ISO 639-1 language of the buyer.
	pub language: String,
	/// Payment description shown by the bank.
	pub message: String,
	/// URL the bank posts a successful response to.
	pub return_url: String,
	/// URL the bank posts a cancellation to.
	pub cancel_url: String,
	/// Time the request was built.
	pub timestamp: DateTime<FixedOffset>,
}

/// Signed form handed to the Form Renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentForm {
	/// Gateway that produced the form.
	pub gateway: String,
	/// Bank endpoint the form posts to.
	pub action_url: String,
	/// Hidden input fields, signature included.
	pub fields: FieldMap,
}

/// Outcome of validating a bank callback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
	/// Signature valid and the bank confirmed payment.
	Paid,
	/// Signature valid, payment not yet settled. Re-checkable.
	Pending,
	/// Signature valid and the payment was cancelled.
	Cancelled,
	/// A signature was present but did not verify.
	InvalidSignature,
	/// Required fields missing, inconsistent or with an unknown status code.
	MalformedResponse,
}

impl PaymentOutcome {
	/// Returns true when the response was authenticated.
	pub fn is_authentic(&self) -> bool {
		matches!(
			self,
			PaymentOutcome::Paid | PaymentOutcome::Pending | PaymentOutcome::Cancelled
		)
	}
}

impl fmt::Display for PaymentOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PaymentOutcome::Paid => write!(f, "Paid"),
			PaymentOutcome::Pending => write!(f, "Pending"),
			PaymentOutcome::Cancelled => write!(f, "Cancelled"),
			PaymentOutcome::InvalidSignature => write!(f, "InvalidSignature"),
			PaymentOutcome::MalformedResponse => write!(f, "MalformedResponse"),
		}
	}
}

/// How a callback reached the shop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallbackDelivery {
	/// Server-to-server notification from the bank (`VK_AUTO=Y`).
	Automatic,
	/// The buyer's browser returning from the bank.
	#[default]
	BuyerReturn,
}

/// Reason a callback was not accepted as authentic and consistent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseDefect {
	#[error("Missing required field: {field}")]
	MissingField { field: String },
	#[error("Unknown service code: {code}")]
	UnknownService { code: String },
	#[error("Field '{field}' exceeds {max} characters")]
	FieldTooLong { field: String, max: usize },
	#[error("Response carries no signature")]
	SignatureAbsent,
	#[error("Signature is not valid base64")]
	SignatureUndecodable,
	#[error("Signature does not match the signed fields")]
	SignatureMismatch,
	#[error("Protocol version {actual} does not match configured {expected}")]
	VersionMismatch { expected: String, actual: String },
	#[error("Response addressed to {actual}, expected {expected}")]
	RecipientMismatch { expected: String, actual: String },
	#[error("Stamp '{stamp}' is not a digit string")]
	InvalidStamp { stamp: String },
	#[error("Reference {actual} does not match expected {expected}")]
	ReferenceMismatch { expected: String, actual: String },
	#[error("Amount '{amount}' is not a valid decimal")]
	InvalidAmount { amount: String },
	#[error("Paid {actual} {currency_actual}, order expects {expected} {currency_expected}")]
	AmountMismatch {
		expected: u64,
		actual: u64,
		currency_expected: String,
		currency_actual: String,
	},
}

/// Tagged outcome of parsing one bank callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
	/// Gateway that parsed the response.
	pub gateway: String,
	/// Verification outcome.
	pub outcome: PaymentOutcome,
	/// Order identifier (`VK_STAMP`) as sent back by the bank.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stamp: Option<String>,
	/// Reference number sent back by the bank.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reference: Option<String>,
	/// Bank transaction number, present on paid responses.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_id: Option<String>,
	/// Paid amount in minor units, present on paid responses.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub amount: Option<u64>,
	/// Paid currency, present on paid responses.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub currency: Option<String>,
	/// Whether the bank or the buyer delivered the callback.
	#[serde(default)]
	pub delivery: CallbackDelivery,
	/// Why the response was rejected, for rejected outcomes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub defect: Option<ResponseDefect>,
}

impl VerificationResult {
	/// Creates a rejected result carrying the defect that caused it.
	pub fn rejected(
		gateway: impl Into<String>,
		outcome: PaymentOutcome,
		defect: ResponseDefect,
	) -> Self {
		Self {
			gateway: gateway.into(),
			outcome,
			stamp: None,
			reference: None,
			transaction_id: None,
			amount: None,
			currency: None,
			delivery: CallbackDelivery::default(),
			defect: Some(defect),
		}
	}

	/// Creates a malformed-response result.
	pub fn malformed(gateway: impl Into<String>, defect: ResponseDefect) -> Self {
		Self::rejected(gateway, PaymentOutcome::MalformedResponse, defect)
	}

	/// Attaches the stamp echoed by the bank, when known.
	pub fn with_stamp(mut self, stamp: Option<String>) -> Self {
		self.stamp = stamp;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rejected_outcomes_are_not_authentic() {
		assert!(!PaymentOutcome::InvalidSignature.is_authentic());
		assert!(!PaymentOutcome::MalformedResponse.is_authentic());
		assert!(PaymentOutcome::Cancelled.is_authentic());
	}

	#[test]
	fn test_malformed_result_carries_defect() {
		let result = VerificationResult::malformed(
			"swedbank",
			ResponseDefect::MissingField {
				field: "VK_MAC".into(),
			},
		)
		.with_stamp(Some("12345".into()));

		assert_eq!(result.outcome, PaymentOutcome::MalformedResponse);
		assert_eq!(result.stamp.as_deref(), Some("12345"));
		assert_eq!(
			result.defect.unwrap().to_string(),
			"Missing required field: VK_MAC"
		);
	}

	#[test]
	fn test_defect_serializes_tagged() {
		let json = serde_json::to_value(ResponseDefect::SignatureMismatch).unwrap();
		assert_eq!(json["kind"], "signature_mismatch");
	}
}
