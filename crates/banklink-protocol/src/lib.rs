//! IPIZZA banklink protocol rules.
//!
//! This crate holds the pure, deterministic parts of the protocol: the
//! reference number checksum, the amount codec, the per-variant field
//! layouts with their canonical encoding, and the table of supported bank
//! variants. Nothing here performs I/O or touches keys.

pub mod amount;
pub mod canonical;
pub mod checksum;
pub mod fields;
pub mod variants;

pub use amount::{format_amount, parse_amount};
pub use canonical::{
	canonical_fields, mac_string, CanonicalError, CanonicalField, Direction, Encoding, FieldRule,
	RequestLayout, ResponseLayout,
};
pub use checksum::{checksum_digit, is_digit_string, reference_with_checksum};
pub use variants::{find_variant, ProtocolVersion, VariantDescriptor, VARIANTS};
