//! Reference number checksum (Estonian 7-3-1 method).
//!
//! The digits of the stamp are weighted 7, 3, 1, 7, 3, 1, ... starting from
//! the least significant one. The check digit brings the weighted sum up to
//! the next multiple of ten.
//!
//! Non-digit bytes count as zero but still consume a weight position. This
//! matches what the banks' own reference validators were fed historically;
//! callers that need strict input check [`is_digit_string`] first.

const WEIGHTS: [u64; 3] = [7, 3, 1];

/// Computes the check digit for a stamp.
pub fn checksum_digit(stamp: &str) -> u8 {
	let sum: u64 = stamp
		.bytes()
		.rev()
		.zip(WEIGHTS.iter().cycle())
		.map(|(byte, weight)| digit_value(byte) * weight)
		.sum();

	((10 - sum % 10) % 10) as u8
}

/// Appends the check digit to a stamp.
pub fn reference_with_checksum(stamp: &str) -> String {
	format!("{}{}", stamp, checksum_digit(stamp))
}

/// Returns true for a non-empty string of ASCII digits.
pub fn is_digit_string(value: &str) -> bool {
	!value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn digit_value(byte: u8) -> u64 {
	if byte.is_ascii_digit() {
		u64::from(byte - b'0')
	} else {
		0
	}
}
