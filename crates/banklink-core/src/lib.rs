//! Gateway protocol driver for IPIZZA banklinks.
//!
//! This crate ties the protocol rules, the signer/verifier and the Order
//! Store together. A [`GatewayDriver`] is one configured bank: it builds
//! signed payment requests and turns bank callbacks into a
//! [`VerificationResult`](banklink_types::VerificationResult). The
//! [`GatewayService`] owns the drivers and applies verified outcomes to the
//! Order Store, reporting what happened as
//! [`GatewayEvent`](banklink_types::GatewayEvent)s instead of logging it.

use banklink_config::ConfigError;
use banklink_crypto::CryptoError;
use banklink_protocol::CanonicalError;
use banklink_storage::StorageError;
use thiserror::Error;

pub mod credentials;
pub mod driver;
pub mod service;

pub use credentials::MerchantCredentials;
pub use driver::GatewayDriver;
pub use service::{CallbackReport, GatewayService, PreparedPayment};

/// Errors raised when a gateway's settings cannot produce usable credentials.
///
/// These are fatal for the gateway and meant for the merchant, not the buyer.
#[derive(Debug, Error)]
pub enum ConfigurationError {
	#[error("Gateway '{gateway}' is missing setting '{key}'")]
	MissingSetting { gateway: String, key: &'static str },
	#[error("Gateway '{gateway}' names unknown bank variant '{variant}'")]
	UnknownVariant { gateway: String, variant: String },
	#[error("Gateway '{gateway}' does not support protocol version '{version}'")]
	UnsupportedVersion { gateway: String, version: String },
	#[error("Gateway '{gateway}': {source}")]
	Crypto {
		gateway: String,
		#[source]
		source: CryptoError,
	},
	#[error("Gateway '{gateway}' {role} key has {bits} bits, protocol requires at least {min}")]
	KeyTooSmall {
		gateway: String,
		role: &'static str,
		bits: u32,
		min: u32,
	},
}

/// Errors returned by gateway operations.
///
/// Rejected callbacks are not errors; they come back as outcomes.
#[derive(Debug, Error)]
pub enum GatewayError {
	#[error(transparent)]
	Configuration(#[from] ConfigurationError),
	#[error("Config error: {0}")]
	Config(#[from] ConfigError),
	#[error("Canonicalization error: {0}")]
	Canonical(#[from] CanonicalError),
	#[error("Signing error: {0}")]
	Crypto(#[from] CryptoError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Order id '{0}' is not a digit string")]
	InvalidStamp(String),
	#[error("Unknown gateway '{0}'")]
	UnknownGateway(String),
	#[error("Gateway '{gateway}' is not available for order {order_id}")]
	Unavailable { gateway: String, order_id: String },
	#[error("Order {0} is already paid")]
	AlreadyPaid(String),
	#[error("Callback refers to unknown order {0}")]
	UnknownOrder(String),
}
