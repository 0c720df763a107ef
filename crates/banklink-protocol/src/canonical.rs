//! Field canonicalization and the MAC string.
//!
//! The signature covers the values of a fixed, ordered field list. Each
//! value is prefixed with its length in characters, zero-padded to three
//! digits, and the results are concatenated. Banks compute the same string
//! on their side, so field order and value encoding must be exact.

use crate::fields::VK_SERVICE;
use crate::variants::VariantDescriptor;
use banklink_types::{FieldMap, PaymentOutcome};
use thiserror::Error;

/// Longest value the three-digit length prefix can describe.
pub const MAX_VALUE_LEN: usize = 999;

/// Errors raised while building the canonical field sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalError {
	/// A field required by the layout is absent from the payload.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// The payload's service code has no layout in this variant.
	#[error("Unknown service code: {0}")]
	UnknownService(String),
	/// A value does not fit its declared maximum length.
	#[error("Field '{field}' exceeds {max} characters")]
	FieldTooLong { field: String, max: usize },
}

/// Which side of the exchange a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	/// Merchant to bank.
	Request,
	/// Bank to merchant.
	Response,
}

/// How an outbound value is encoded before it is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
	/// Sent exactly as given.
	Verbatim,
	/// Leading and trailing whitespace removed.
	Trimmed,
	/// Trimmed and upper-cased.
	Uppercase,
	/// Trimmed and cut to the rule's maximum length.
	Truncated,
}

impl Encoding {
	fn apply(&self, value: &str, max_len: usize) -> String {
		match self {
			Encoding::Verbatim => value.to_string(),
			Encoding::Trimmed => value.trim().to_string(),
			Encoding::Uppercase => value.trim().to_uppercase(),
			Encoding::Truncated => value.trim().chars().take(max_len).collect(),
		}
	}
}

/// One position in a signed field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
	pub name: &'static str,
	/// Maximum length in characters.
	pub max_len: usize,
	pub encoding: Encoding,
}

impl FieldRule {
	pub const fn new(name: &'static str, max_len: usize, encoding: Encoding) -> Self {
		Self {
			name,
			max_len,
			encoding,
		}
	}
}

/// Signed fields of an outbound request, in signing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLayout {
	/// Value of `VK_SERVICE` for this request.
	pub service: &'static str,
	pub fields: &'static [FieldRule],
}

/// Signed fields of one inbound response type.
///
/// The service code selects the layout and fixes the outcome a verified
/// response of this type stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLayout {
	pub service: &'static str,
	pub outcome: PaymentOutcome,
	pub fields: &'static [FieldRule],
}

/// Field name with its encoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalField {
	pub name: &'static str,
	pub value: String,
}

/// Picks the signed fields out of `payload` in layout order.
///
/// Outbound values are encoded according to their rule and length-checked.
/// Inbound values are taken verbatim, since the bank signed exactly what it
/// sent; the layout is chosen by the payload's `VK_SERVICE`.
pub fn canonical_fields(
	direction: Direction,
	variant: &VariantDescriptor,
	payload: &FieldMap,
) -> Result<Vec<CanonicalField>, CanonicalError> {
	match direction {
		Direction::Request => variant
			.request
			.fields
			.iter()
			.map(|rule| {
				let raw = required(payload, rule.name)?;
				let value = rule.encoding.apply(raw, rule.max_len);
				if value.chars().count() > rule.max_len {
					return Err(CanonicalError::FieldTooLong {
						field: rule.name.to_string(),
						max: rule.max_len,
					});
				}
				Ok(CanonicalField {
					name: rule.name,
					value,
				})
			})
			.collect(),
		Direction::Response => {
			let service = required(payload, VK_SERVICE)?;
			let layout = variant
				.response_layout(service)
				.ok_or_else(|| CanonicalError::UnknownService(service.to_string()))?;

			layout
				.fields
				.iter()
				.map(|rule| {
					Ok(CanonicalField {
						name: rule.name,
						value: required(payload, rule.name)?.to_string(),
					})
				})
				.collect()
		}
	}
}

/// Builds the string the signature is computed over.
pub fn mac_string(fields: &[CanonicalField]) -> Result<String, CanonicalError> {
	let mut out = String::new();
	for field in fields {
		let len = field.value.chars().count();
		if len > MAX_VALUE_LEN {
			return Err(CanonicalError::FieldTooLong {
				field: field.name.to_string(),
				max: MAX_VALUE_LEN,
			});
		}
		out.push_str(&format!("{:03}", len));
		out.push_str(&field.value);
	}
	Ok(out)
}

fn required<'a>(payload: &'a FieldMap, name: &str) -> Result<&'a str, CanonicalError> {
	payload
		.get(name)
		.map(String::as_str)
		.ok_or_else(|| CanonicalError::MissingField(name.to_string()))
}
