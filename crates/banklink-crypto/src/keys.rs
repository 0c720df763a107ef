//! RSA key loading.
//!
//! Merchants paste keys into their settings in whatever shape the bank
//! handed them out: full PEM, PEM with mangled line breaks, bare base64, or
//! an X.509 certificate for the bank side. All of those are accepted here.

use crate::CryptoError;
use banklink_types::SecretString;
use openssl::pkey::{Id, PKey, Private, Public};
use openssl::x509::X509;
use std::fmt;

/// Merchant private key used to sign outbound requests.
#[derive(Clone)]
pub struct SigningKey {
	pkey: PKey<Private>,
}

impl SigningKey {
	/// Parses a PEM private key, decrypting it when a passphrase is given.
	///
	/// An empty passphrase is treated as no passphrase.
	pub fn from_pem(pem: &str, passphrase: Option<&SecretString>) -> Result<Self, CryptoError> {
		let pem = armor(pem, "RSA PRIVATE KEY");
		let pkey = match passphrase.filter(|p| !p.is_empty()) {
			Some(passphrase) => PKey::private_key_from_pem_passphrase(
				pem.as_bytes(),
				passphrase.expose_secret().as_bytes(),
			),
			None => PKey::private_key_from_pem(pem.as_bytes()),
		}
		.map_err(|e| CryptoError::InvalidKey(format!("private key: {}", e)))?;

		ensure_rsa(pkey.id())?;
		Ok(Self { pkey })
	}

	/// Returns the modulus size in bits.
	pub fn bits(&self) -> u32 {
		self.pkey.bits()
	}

	/// Derives the matching public key.
	pub fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
		let pem = self
			.pkey
			.public_key_to_pem()
			.map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
		let pkey = PKey::public_key_from_pem(&pem)
			.map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
		Ok(VerifyingKey { pkey })
	}

	pub(crate) fn pkey(&self) -> &PKey<Private> {
		&self.pkey
	}
}

impl fmt::Debug for SigningKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SigningKey(rsa-{}, ***REDACTED***)", self.bits())
	}
}

/// Bank public key used to verify inbound responses.
#[derive(Clone)]
pub struct VerifyingKey {
	pkey: PKey<Public>,
}

impl VerifyingKey {
	/// Parses a PEM public key or an X.509 certificate.
	pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
		let pkey = if pem.contains("BEGIN CERTIFICATE") {
			X509::from_pem(pem.trim().as_bytes())
				.and_then(|cert| cert.public_key())
				.map_err(|e| CryptoError::InvalidKey(format!("certificate: {}", e)))?
		} else {
			PKey::public_key_from_pem(armor(pem, "PUBLIC KEY").as_bytes())
				.map_err(|e| CryptoError::InvalidKey(format!("public key: {}", e)))?
		};

		ensure_rsa(pkey.id())?;
		Ok(Self { pkey })
	}

	/// Returns the modulus size in bits.
	pub fn bits(&self) -> u32 {
		self.pkey.bits()
	}

	pub(crate) fn pkey(&self) -> &PKey<Public> {
		&self.pkey
	}
}

impl fmt::Debug for VerifyingKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "VerifyingKey(rsa-{})", self.bits())
	}
}

fn ensure_rsa(id: Id) -> Result<(), CryptoError> {
	if id != Id::RSA {
		return Err(CryptoError::InvalidKey("expected an RSA key".into()));
	}
	Ok(())
}

/// Wraps bare base64 key material in PEM armor with 64-character lines.
fn armor(key: &str, label: &str) -> String {
	let key = key.trim();
	if key.contains("-----BEGIN") {
		return key.to_string();
	}

	let body: Vec<char> = key.chars().filter(|c| !c.is_whitespace()).collect();
	let lines = body
		.chunks(64)
		.map(|chunk| chunk.iter().collect::<String>())
		.collect::<Vec<String>>()
		.join("\n");

	format!("-----BEGIN {label}-----\n{lines}\n-----END {label}-----")
}
