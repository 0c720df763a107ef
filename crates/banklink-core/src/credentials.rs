//! Merchant Credentials loading.

use crate::ConfigurationError;
use banklink_config::SettingsProvider;
use banklink_crypto::{DigestAlgorithm, SigningKey, VerifyingKey};
use banklink_protocol::{ProtocolVersion, VariantDescriptor};
use banklink_types::SecretString;
use std::str::FromStr;

/// Keys and identity of one configured gateway. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct MerchantCredentials {
	/// Value of `VK_SND_ID` on requests and `VK_REC_ID` on responses.
	pub merchant_id: String,
	pub version: ProtocolVersion,
	pub digest: DigestAlgorithm,
	signing_key: SigningKey,
	verifying_key: VerifyingKey,
}

impl MerchantCredentials {
	/// Loads credentials from a gateway's settings.
	///
	/// Reads `merchant_id`, `private_key` (with optional
	/// `private_key_passphrase`), `public_key`, `vk_version` and `digest`.
	/// The version defaults to the variant's and implies the digest unless
	/// `digest` overrides it. Both keys must meet the version's minimum size.
	pub fn from_settings(
		gateway: &str,
		settings: &dyn SettingsProvider,
		variant: &VariantDescriptor,
	) -> Result<Self, ConfigurationError> {
		let merchant_id = settings.get("merchant_id", "").trim().to_string();
		if merchant_id.is_empty() {
			return Err(missing(gateway, "merchant_id"));
		}

		let version_code = settings.get("vk_version", variant.default_version.code);
		let version = variant.version(version_code.trim()).ok_or_else(|| {
			ConfigurationError::UnsupportedVersion {
				gateway: gateway.to_string(),
				version: version_code.clone(),
			}
		})?;

		let digest = match settings.get("digest", "").trim() {
			"" => version.digest,
			name => DigestAlgorithm::from_str(name).map_err(|source| crypto(gateway, source))?,
		};

		let private_pem = SecretString::from(settings.get("private_key", ""));
		if private_pem.expose_secret().trim().is_empty() {
			return Err(missing(gateway, "private_key"));
		}
		let passphrase = SecretString::from(settings.get("private_key_passphrase", ""));
		let signing_key = SigningKey::from_pem(private_pem.expose_secret(), Some(&passphrase))
			.map_err(|source| crypto(gateway, source))?;
		check_size(gateway, "private", signing_key.bits(), &version)?;

		let public_pem = settings.get("public_key", "");
		if public_pem.trim().is_empty() {
			return Err(missing(gateway, "public_key"));
		}
		let verifying_key =
			VerifyingKey::from_pem(&public_pem).map_err(|source| crypto(gateway, source))?;
		check_size(gateway, "bank public", verifying_key.bits(), &version)?;

		Ok(Self {
			merchant_id,
			version,
			digest,
			signing_key,
			verifying_key,
		})
	}

	/// Merchant key for signing requests.
	pub fn signing_key(&self) -> &SigningKey {
		&self.signing_key
	}

	/// Bank key for verifying responses.
	pub fn verifying_key(&self) -> &VerifyingKey {
		&self.verifying_key
	}
}

fn missing(gateway: &str, key: &'static str) -> ConfigurationError {
	ConfigurationError::MissingSetting {
		gateway: gateway.to_string(),
		key,
	}
}

fn crypto(gateway: &str, source: banklink_crypto::CryptoError) -> ConfigurationError {
	ConfigurationError::Crypto {
		gateway: gateway.to_string(),
		source,
	}
}

fn check_size(
	gateway: &str,
	role: &'static str,
	bits: u32,
	version: &ProtocolVersion,
) -> Result<(), ConfigurationError> {
	if bits < version.min_key_bits {
		return Err(ConfigurationError::KeyTooSmall {
			gateway: gateway.to_string(),
			role,
			bits,
			min: version.min_key_bits,
		});
	}
	Ok(())
}
