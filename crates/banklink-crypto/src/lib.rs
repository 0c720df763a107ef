//! Signing and verification for banklink messages.
//!
//! Banks of the IPIZZA family sign the canonical field string with RSA
//! (PKCS#1 v1.5) over a configurable digest. This crate wraps the openssl
//! primitives behind two calls: [`sign`] for outbound requests with the
//! merchant's private key and [`verify`] for inbound responses with the
//! bank's public key.

use base64::{engine::general_purpose::STANDARD, Engine};
use openssl::hash::MessageDigest;
use openssl::sign::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod keys;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use keys::{SigningKey, VerifyingKey};

/// Errors that can occur while loading keys or producing signatures.
///
/// Verification never returns an error; a response that cannot be verified
/// for any reason is simply not authentic.
#[derive(Debug, Error)]
pub enum CryptoError {
	/// Error that occurs when key material cannot be parsed or is unsuitable.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when the signing primitive fails.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a digest name is not recognised.
	#[error("Unsupported digest algorithm: {0}")]
	UnsupportedDigest(String),
}

/// Message digest used underneath the RSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
	Sha1,
	Sha256,
	Sha512,
}

impl DigestAlgorithm {
	fn message_digest(&self) -> MessageDigest {
		match self {
			DigestAlgorithm::Sha1 => MessageDigest::sha1(),
			DigestAlgorithm::Sha256 => MessageDigest::sha256(),
			DigestAlgorithm::Sha512 => MessageDigest::sha512(),
		}
	}

	/// Returns the configuration name of the digest.
	pub fn as_str(&self) -> &'static str {
		match self {
			DigestAlgorithm::Sha1 => "sha1",
			DigestAlgorithm::Sha256 => "sha256",
			DigestAlgorithm::Sha512 => "sha512",
		}
	}
}

impl fmt::Display for DigestAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DigestAlgorithm {
	type Err = CryptoError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
			"sha1" => Ok(DigestAlgorithm::Sha1),
			"sha256" => Ok(DigestAlgorithm::Sha256),
			"sha512" => Ok(DigestAlgorithm::Sha512),
			_ => Err(CryptoError::UnsupportedDigest(s.to_string())),
		}
	}
}

/// Signs canonical bytes with the merchant's private key.
pub fn sign(
	canonical: &[u8],
	key: &SigningKey,
	digest: DigestAlgorithm,
) -> Result<Vec<u8>, CryptoError> {
	let mut signer = Signer::new(digest.message_digest(), key.pkey())
		.map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
	signer
		.update(canonical)
		.map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
	signer
		.sign_to_vec()
		.map_err(|e| CryptoError::SigningFailed(e.to_string()))
}

/// Verifies a signature over canonical bytes with the bank's public key.
///
/// Returns false on mismatch and on any library failure, such as a
/// signature of the wrong length.
pub fn verify(
	canonical: &[u8],
	signature: &[u8],
	key: &VerifyingKey,
	digest: DigestAlgorithm,
) -> bool {
	let result = Verifier::new(digest.message_digest(), key.pkey()).and_then(|mut verifier| {
		verifier.update(canonical)?;
		verifier.verify(signature)
	});

	match result {
		Ok(valid) => valid,
		Err(e) => {
			tracing::debug!("Signature verification error: {}", e);
			false
		},
	}
}

/// Verifies a signature against a PEM encoded public key or certificate.
///
/// A key that fails to parse makes the signature invalid.
pub fn verify_pem(
	canonical: &[u8],
	signature: &[u8],
	public_pem: &str,
	digest: DigestAlgorithm,
) -> bool {
	match VerifyingKey::from_pem(public_pem) {
		Ok(key) => verify(canonical, signature, &key, digest),
		Err(e) => {
			tracing::debug!("Rejecting signature, unusable public key: {}", e);
			false
		},
	}
}

/// Encodes a signature for transport in a form field.
pub fn encode_signature(signature: &[u8]) -> String {
	STANDARD.encode(signature)
}

/// Decodes a transported signature; `None` if it is not valid base64.
pub fn decode_signature(encoded: &str) -> Option<Vec<u8>> {
	STANDARD.decode(encoded.trim()).ok()
}
