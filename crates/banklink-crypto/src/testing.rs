//! RSA key-pair fixtures for tests.
//!
//! Key generation is slow, so the shared fixtures are generated once per
//! test binary.

use once_cell::sync::Lazy;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::{X509Builder, X509NameBuilder};

/// PEM encoded RSA key pair.
pub struct KeyPairFixture {
	/// PKCS#8 private key.
	pub private_pem: String,
	/// SubjectPublicKeyInfo public key.
	pub public_pem: String,
	/// Self-signed certificate wrapping the public key.
	pub certificate_pem: String,
}

/// Key pair standing in for the merchant.
pub static MERCHANT_KEYS: Lazy<KeyPairFixture> = Lazy::new(|| generate_key_pair(2048));

/// Key pair standing in for the bank.
pub static BANK_KEYS: Lazy<KeyPairFixture> = Lazy::new(|| generate_key_pair(2048));

/// Generates a fresh RSA key pair of the given size.
pub fn generate_key_pair(bits: u32) -> KeyPairFixture {
	let rsa = Rsa::generate(bits).expect("rsa key generation");
	let pkey = PKey::from_rsa(rsa).expect("pkey from rsa");

	let private_pem = pkey.private_key_to_pem_pkcs8().expect("private pem");
	let public_pem = pkey.public_key_to_pem().expect("public pem");

	let mut name = X509NameBuilder::new().expect("name builder");
	name.append_entry_by_text("CN", "banklink test")
		.expect("common name");
	let name = name.build();

	let mut builder = X509Builder::new().expect("x509 builder");
	builder.set_version(2).expect("version");
	let serial = BigNum::from_u32(1)
		.and_then(|n| n.to_asn1_integer())
		.expect("serial");
	builder.set_serial_number(&serial).expect("serial number");
	builder.set_subject_name(&name).expect("subject");
	builder.set_issuer_name(&name).expect("issuer");
	builder.set_pubkey(&pkey).expect("pubkey");
	let not_before = Asn1Time::days_from_now(0).expect("not before");
	let not_after = Asn1Time::days_from_now(365).expect("not after");
	builder.set_not_before(&not_before).expect("set not before");
	builder.set_not_after(&not_after).expect("set not after");
	builder
		.sign(&pkey, MessageDigest::sha256())
		.expect("self sign");
	let certificate_pem = builder.build().to_pem().expect("certificate pem");

	KeyPairFixture {
		private_pem: String::from_utf8(private_pem).expect("utf8 pem"),
		public_pem: String::from_utf8(public_pem).expect("utf8 pem"),
		certificate_pem: String::from_utf8(certificate_pem).expect("utf8 pem"),
	}
}

/// Re-encodes a fixture's private key encrypted with `passphrase`.
pub fn encrypted_private_pem(fixture: &KeyPairFixture, passphrase: &str) -> String {
	let pkey = PKey::private_key_from_pem(fixture.private_pem.as_bytes()).expect("fixture key");
	let pem = pkey
		.private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), passphrase.as_bytes())
		.expect("encrypted pem");
	String::from_utf8(pem).expect("utf8 pem")
}
