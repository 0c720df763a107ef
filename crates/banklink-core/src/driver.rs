//! Gateway Protocol Driver.
//!
//! One driver per configured bank. The driver is parameterized by a
//! [`VariantDescriptor`] and never branches on the bank's identity: field
//! layouts, versions and status codes all come from the descriptor.

use crate::{ConfigurationError, GatewayError, MerchantCredentials};
use banklink_config::SettingsProvider;
use banklink_crypto::{decode_signature, encode_signature, sign, verify};
use banklink_protocol::fields::*;
use banklink_protocol::{
	canonical_fields, find_variant, format_amount, is_digit_string, mac_string, parse_amount,
	reference_with_checksum, CanonicalError, Direction, VariantDescriptor,
};
use banklink_types::{
	CallbackDelivery, FieldMap, Order, PaymentForm, PaymentOutcome, PaymentRequest,
	ResponseDefect, VerificationResult,
};
use chrono::{DateTime, FixedOffset};
use tracing::instrument;

/// Format of `VK_DATETIME`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Default payment description; `{order}` is replaced by the order number.
pub const DEFAULT_MESSAGE: &str = "Order nr. {order} payment";

const DEFAULT_LANGUAGE: &str = "et";
const ALL_COUNTRIES: &str = "all";

/// A configured bank gateway.
#[derive(Debug)]
pub struct GatewayDriver {
	name: String,
	variant: &'static VariantDescriptor,
	credentials: MerchantCredentials,
	enabled: bool,
	countries: Vec<String>,
	language: String,
	bank_url: String,
	notify_url: Option<String>,
	message: String,
}

impl GatewayDriver {
	/// Builds a driver for the built-in variant named by the `variant`
	/// setting.
	pub fn from_settings(
		name: &str,
		settings: &dyn SettingsProvider,
	) -> Result<Self, ConfigurationError> {
		let variant_name = settings.get("variant", "");
		if variant_name.trim().is_empty() {
			return Err(ConfigurationError::MissingSetting {
				gateway: name.to_string(),
				key: "variant",
			});
		}
		let variant =
			find_variant(&variant_name).ok_or_else(|| ConfigurationError::UnknownVariant {
				gateway: name.to_string(),
				variant: variant_name.clone(),
			})?;
		Self::new(name, variant, settings)
	}

	/// Builds a driver for an explicit variant descriptor.
	pub fn new(
		name: &str,
		variant: &'static VariantDescriptor,
		settings: &dyn SettingsProvider,
	) -> Result<Self, ConfigurationError> {
		let credentials = MerchantCredentials::from_settings(name, settings, variant)?;

		let mut countries = settings.get_list("countries");
		if countries.is_empty() {
			countries.push(ALL_COUNTRIES.to_string());
		}
		let notify_url = Some(settings.get("notify_url", ""))
			.map(|url| url.trim().to_string())
			.filter(|url| !url.is_empty());

		Ok(Self {
			name: name.to_string(),
			variant,
			credentials,
			enabled: settings.get_flag("enabled", true),
			countries,
			language: settings.get("language", DEFAULT_LANGUAGE),
			bank_url: settings.get("bank_url", variant.bank_url),
			notify_url,
			message: settings.get("message", DEFAULT_MESSAGE),
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn variant(&self) -> &'static VariantDescriptor {
		self.variant
	}

	pub fn credentials(&self) -> &MerchantCredentials {
		&self.credentials
	}

	/// Whether buyers from `country` may pay through this gateway.
	pub fn is_available(&self, country: Option<&str>) -> bool {
		if !self.enabled {
			return false;
		}
		self.countries.iter().any(|allowed| {
			allowed.eq_ignore_ascii_case(ALL_COUNTRIES)
				|| country.is_some_and(|c| allowed.eq_ignore_ascii_case(c.trim()))
		})
	}

	/// Derives the payment request for an order.
	///
	/// The order id is the stamp and must be a digit string; the reference
	/// is the stamp plus its check digit. The bank posts back to the
	/// gateway's `notify_url` when set, otherwise to the order's own URLs.
	pub fn payment_request(
		&self,
		order: &Order,
		now: DateTime<FixedOffset>,
	) -> Result<PaymentRequest, GatewayError> {
		if !is_digit_string(&order.id) {
			return Err(GatewayError::InvalidStamp(order.id.clone()));
		}

		let language = order
			.language
			.clone()
			.filter(|l| !l.trim().is_empty())
			.unwrap_or_else(|| self.language.clone());

		Ok(PaymentRequest {
			stamp: order.id.clone(),
			reference: reference_with_checksum(&order.id),
			amount: order.amount,
			currency: order.currency.clone(),
			language,
			message: self.message.replace("{order}", &order.number),
			return_url: self
				.notify_url
				.clone()
				.unwrap_or_else(|| order.return_url.clone()),
			cancel_url: self
				.notify_url
				.clone()
				.unwrap_or_else(|| order.cancel_url.clone()),
			timestamp: now,
		})
	}

	/// Builds the signed form for a payment request.
	///
	/// Signed fields are written to the form exactly as they were encoded
	/// for signing.
	#[instrument(skip_all, fields(gateway = %self.name, stamp = %request.stamp))]
	pub fn build_request(&self, request: &PaymentRequest) -> Result<PaymentForm, GatewayError> {
		if !is_digit_string(&request.stamp) {
			return Err(GatewayError::InvalidStamp(request.stamp.clone()));
		}

		let mut fields = FieldMap::new();
		let mut put = |name: &str, value: String| {
			fields.insert(name.to_string(), value);
		};
		put(VK_SERVICE, self.variant.request.service.to_string());
		put(VK_VERSION, self.credentials.version.code.to_string());
		put(VK_SND_ID, self.credentials.merchant_id.clone());
		put(VK_STAMP, request.stamp.clone());
		put(VK_AMOUNT, format_amount(request.amount));
		put(VK_CURR, request.currency.clone());
		put(VK_REF, request.reference.clone());
		put(VK_MSG, request.message.clone());
		put(VK_RETURN, request.return_url.clone());
		put(VK_CANCEL, request.cancel_url.clone());
		put(VK_DATETIME, request.timestamp.format(DATETIME_FORMAT).to_string());

		let canonical = canonical_fields(Direction::Request, self.variant, &fields)?;
		for field in &canonical {
			fields.insert(field.name.to_string(), field.value.clone());
		}

		let mac = mac_string(&canonical)?;
		let signature = sign(
			mac.as_bytes(),
			self.credentials.signing_key(),
			self.credentials.digest,
		)?;

		fields.insert(VK_MAC.to_string(), encode_signature(&signature));
		fields.insert(VK_ENCODING.to_string(), self.variant.charset.to_string());
		fields.insert(
			VK_LANG.to_string(),
			self.variant.language_code(&request.language).to_string(),
		);

		tracing::debug!(digest = %self.credentials.digest, "Signed payment request");
		Ok(PaymentForm {
			gateway: self.name.clone(),
			action_url: self.bank_url.clone(),
			fields,
		})
	}

	/// Validates a bank callback.
	///
	/// The signature is checked before any field is trusted. Only an
	/// authentic response is then checked against this merchant's identity
	/// and protocol version and mapped to its outcome. Never fails: every
	/// defect is reported in the returned result.
	#[instrument(skip_all, fields(gateway = %self.name))]
	pub fn parse_response(&self, fields: &FieldMap) -> VerificationResult {
		let stamp = fields.get(VK_STAMP).cloned();
		let malformed = |defect: ResponseDefect| {
			VerificationResult::malformed(&self.name, defect).with_stamp(stamp.clone())
		};
		let forged = |defect: ResponseDefect| {
			VerificationResult::rejected(&self.name, PaymentOutcome::InvalidSignature, defect)
				.with_stamp(stamp.clone())
		};

		let canonical = match canonical_fields(Direction::Response, self.variant, fields) {
			Ok(canonical) => canonical,
			Err(e) => return malformed(defect_from(e)),
		};
		let mac = match mac_string(&canonical) {
			Ok(mac) => mac,
			Err(e) => return malformed(defect_from(e)),
		};

		let Some(encoded) = fields.get(VK_MAC).filter(|v| !v.trim().is_empty()) else {
			return malformed(ResponseDefect::SignatureAbsent);
		};
		let Some(signature) = decode_signature(encoded) else {
			return forged(ResponseDefect::SignatureUndecodable);
		};
		if !verify(
			mac.as_bytes(),
			&signature,
			self.credentials.verifying_key(),
			self.credentials.digest,
		) {
			return forged(ResponseDefect::SignatureMismatch);
		}

		match self.authenticated_result(fields) {
			Ok(result) => {
				tracing::debug!(outcome = %result.outcome, "Verified bank response");
				result
			},
			Err(defect) => malformed(defect),
		}
	}

	fn authenticated_result(
		&self,
		fields: &FieldMap,
	) -> Result<VerificationResult, ResponseDefect> {
		let service = required(fields, VK_SERVICE)?;
		let layout = self
			.variant
			.response_layout(service)
			.ok_or_else(|| ResponseDefect::UnknownService {
				code: service.to_string(),
			})?;

		let version = required(fields, VK_VERSION)?;
		if version != self.credentials.version.code {
			return Err(ResponseDefect::VersionMismatch {
				expected: self.credentials.version.code.to_string(),
				actual: version.to_string(),
			});
		}

		let recipient = required(fields, VK_REC_ID)?;
		if recipient != self.credentials.merchant_id {
			return Err(ResponseDefect::RecipientMismatch {
				expected: self.credentials.merchant_id.clone(),
				actual: recipient.to_string(),
			});
		}

		let stamp = required(fields, VK_STAMP)?;
		if !is_digit_string(stamp) {
			return Err(ResponseDefect::InvalidStamp {
				stamp: stamp.to_string(),
			});
		}

		let reference = required(fields, VK_REF)?;
		let expected = reference_with_checksum(stamp);
		if !is_digit_string(reference) || reference != expected {
			return Err(ResponseDefect::ReferenceMismatch {
				expected,
				actual: reference.to_string(),
			});
		}

		let mut result = VerificationResult {
			gateway: self.name.clone(),
			outcome: layout.outcome,
			stamp: Some(stamp.to_string()),
			reference: Some(reference.to_string()),
			transaction_id: None,
			amount: None,
			currency: None,
			delivery: match fields.get(VK_AUTO).map(|v| v.trim()) {
				Some("Y") => CallbackDelivery::Automatic,
				_ => CallbackDelivery::BuyerReturn,
			},
			defect: None,
		};

		if layout.outcome == PaymentOutcome::Paid {
			let amount = required(fields, VK_AMOUNT)?;
			result.amount = Some(parse_amount(amount).ok_or_else(|| {
				ResponseDefect::InvalidAmount {
					amount: amount.to_string(),
				}
			})?);
			result.currency = Some(required(fields, VK_CURR)?.to_string());
			result.transaction_id = fields.get(VK_T_NO).cloned();
		}

		Ok(result)
	}
}

fn required<'a>(fields: &'a FieldMap, name: &str) -> Result<&'a str, ResponseDefect> {
	fields
		.get(name)
		.map(String::as_str)
		.ok_or_else(|| ResponseDefect::MissingField {
			field: name.to_string(),
		})
}

fn defect_from(err: CanonicalError) -> ResponseDefect {
	match err {
		CanonicalError::MissingField(field) => ResponseDefect::MissingField { field },
		CanonicalError::UnknownService(code) => ResponseDefect::UnknownService { code },
		CanonicalError::FieldTooLong { field, max } => ResponseDefect::FieldTooLong { field, max },
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use banklink_config::GatewaySettings;
	use banklink_crypto::testing::{BANK_KEYS, MERCHANT_KEYS};
	use banklink_crypto::{verify_pem, SigningKey};
	use banklink_protocol::canonical::{ResponseLayout, MAX_VALUE_LEN};
	use banklink_protocol::variants::{
		REQUEST_1012, RESPONSE_1111, RESPONSE_1911, SWEDBANK, VERSION_009,
	};
	use chrono::TimeZone;

	pub(crate) fn gateway_settings(variant: &str, extra: &[(&str, &str)]) -> GatewaySettings {
		let mut table = toml::Table::new();
		for (key, value) in [
			("variant", variant),
			("merchant_id", "SHOP"),
			("private_key", MERCHANT_KEYS.private_pem.as_str()),
			("public_key", BANK_KEYS.public_pem.as_str()),
		]
		.into_iter()
		.chain(extra.iter().copied())
		{
			table.insert(key.to_string(), toml::Value::String(value.to_string()));
		}
		GatewaySettings::new(variant, table)
	}

	pub(crate) fn driver(variant: &str) -> GatewayDriver {
		GatewayDriver::from_settings(variant, &gateway_settings(variant, &[])).unwrap()
	}

	/// Signs a response the way the bank would.
	pub(crate) fn bank_signed(
		variant: &'static VariantDescriptor,
		digest: banklink_crypto::DigestAlgorithm,
		mut fields: FieldMap,
	) -> FieldMap {
		let canonical = canonical_fields(Direction::Response, variant, &fields).unwrap();
		let mac = mac_string(&canonical).unwrap();
		let key = SigningKey::from_pem(&BANK_KEYS.private_pem, None).unwrap();
		let signature = sign(mac.as_bytes(), &key, digest).unwrap();
		fields.insert(VK_MAC.to_string(), encode_signature(&signature));
		fields
	}

	pub(crate) fn paid_fields(stamp: &str, amount: &str) -> FieldMap {
		let reference = reference_with_checksum(stamp);
		[
			(VK_SERVICE, "1111"),
			(VK_VERSION, "009"),
			(VK_SND_ID, "HP"),
			(VK_REC_ID, "SHOP"),
			(VK_STAMP, stamp),
			(VK_T_NO, "4321"),
			(VK_AMOUNT, amount),
			(VK_CURR, "EUR"),
			(VK_REC_ACC, "EE871600161234567892"),
			(VK_REC_NAME, "Shop OÜ"),
			(VK_SND_ACC, "EE382200221020145685"),
			(VK_SND_NAME, "Mari Maasikas"),
			(VK_REF, reference.as_str()),
			(VK_MSG, "Order nr. 12345 payment"),
			(VK_T_DATETIME, "2024-05-01T12:01:00+0300"),
			(VK_AUTO, "N"),
		]
		.into_iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect()
	}

	pub(crate) fn cancel_fields(stamp: &str, service: &str) -> FieldMap {
		let reference = reference_with_checksum(stamp);
		[
			(VK_SERVICE, service),
			(VK_VERSION, "009"),
			(VK_SND_ID, "HP"),
			(VK_REC_ID, "SHOP"),
			(VK_STAMP, stamp),
			(VK_REF, reference.as_str()),
			(VK_MSG, "Order nr. 12345 payment"),
			(VK_AUTO, "Y"),
		]
		.into_iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect()
	}

	/// A bank that also reports unsettled payments, under service `1211`.
	pub(crate) static PENDING_BANK: VariantDescriptor = VariantDescriptor {
		name: "pendingbank",
		display_name: "Pending Bank",
		bank_url: "https://bank.example/pay",
		charset: "UTF-8",
		default_version: VERSION_009,
		versions: &[VERSION_009],
		request: REQUEST_1012,
		responses: &[
			RESPONSE_1111,
			RESPONSE_1911,
			ResponseLayout {
				service: "1211",
				outcome: PaymentOutcome::Pending,
				fields: RESPONSE_1911.fields,
			},
		],
		languages: &[("et", "EST")],
		default_language: "EST",
	};

	fn order() -> Order {
		let mut order = Order::new("12345", 1250, "EUR");
		order.return_url = "https://shop.example/return".to_string();
		order.cancel_url = "https://shop.example/cancel".to_string();
		order
	}

	fn tallinn_noon() -> DateTime<FixedOffset> {
		FixedOffset::east_opt(3 * 3600)
			.unwrap()
			.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
			.unwrap()
	}

	#[test]
	fn test_payment_request_uses_reference_checksum() {
		let request = driver("swedbank").payment_request(&order(), tallinn_noon()).unwrap();
		assert_eq!(request.stamp, "12345");
		assert_eq!(request.reference, "123453");
		assert_eq!(request.message, "Order nr. 12345 payment");
		assert_eq!(request.language, "et");
		assert_eq!(request.return_url, "https://shop.example/return");
	}

	#[test]
	fn test_notify_url_replaces_order_urls() {
		let settings = gateway_settings("seb", &[("notify_url", "https://shop.example/notify")]);
		let driver = GatewayDriver::from_settings("seb", &settings).unwrap();
		let request = driver.payment_request(&order(), tallinn_noon()).unwrap();
		assert_eq!(request.return_url, "https://shop.example/notify");
		assert_eq!(request.cancel_url, "https://shop.example/notify");
	}

	#[test]
	fn test_non_digit_order_id_rejected() {
		let mut order = order();
		order.id = "A-17".to_string();
		let err = driver("lhv").payment_request(&order, tallinn_noon()).unwrap_err();
		assert!(matches!(err, GatewayError::InvalidStamp(_)));
	}

	#[test]
	fn test_build_request_signs_canonical_fields() {
		let driver = driver("swedbank");
		let mut order = order();
		order.language = Some("en_GB".to_string());
		let request = driver.payment_request(&order, tallinn_noon()).unwrap();
		let form = driver.build_request(&request).unwrap();

		assert_eq!(form.action_url, "https://www.swedbank.ee/banklink");
		let f = &form.fields;
		assert_eq!(f[VK_SERVICE], "1012");
		assert_eq!(f[VK_VERSION], "009");
		assert_eq!(f[VK_SND_ID], "SHOP");
		assert_eq!(f[VK_AMOUNT], "12.50");
		assert_eq!(f[VK_REF], "123453");
		assert_eq!(f[VK_DATETIME], "2024-05-01T12:00:00+0300");
		assert_eq!(f[VK_ENCODING], "UTF-8");
		assert_eq!(f[VK_LANG], "ENG");

		// The bank recomputes the MAC from the posted fields.
		let canonical = canonical_fields(Direction::Request, &SWEDBANK, f).unwrap();
		let mac = mac_string(&canonical).unwrap();
		let signature = decode_signature(&f[VK_MAC]).unwrap();
		assert!(verify_pem(
			mac.as_bytes(),
			&signature,
			&MERCHANT_KEYS.public_pem,
			banklink_crypto::DigestAlgorithm::Sha512
		));
	}

	#[test]
	fn test_posted_message_is_the_signed_message() {
		let template = format!("Tellimus {{order}} {}", "väga pikk kirjeldus ".repeat(6));
		let settings = gateway_settings("lhv", &[("message", template.as_str())]);
		let driver = GatewayDriver::from_settings("lhv", &settings).unwrap();
		let request = driver.payment_request(&order(), tallinn_noon()).unwrap();
		let form = driver.build_request(&request).unwrap();
		assert_eq!(form.fields[VK_MSG].chars().count(), 95);
	}

	#[test]
	fn test_verified_paid_response() {
		let driver = driver("swedbank");
		let digest = driver.credentials().digest;
		let fields = bank_signed(&SWEDBANK, digest, paid_fields("12345", "12.50"));
		let result = driver.parse_response(&fields);

		assert_eq!(result.outcome, PaymentOutcome::Paid);
		assert_eq!(result.stamp.as_deref(), Some("12345"));
		assert_eq!(result.reference.as_deref(), Some("123453"));
		assert_eq!(result.transaction_id.as_deref(), Some("4321"));
		assert_eq!(result.amount, Some(1250));
		assert_eq!(result.currency.as_deref(), Some("EUR"));
		assert_eq!(result.delivery, CallbackDelivery::BuyerReturn);
		assert!(result.defect.is_none());
	}

	#[test]
	fn test_verified_cancel_response() {
		let driver = driver("seb");
		let fields = bank_signed(
			&banklink_protocol::variants::SEB,
			driver.credentials().digest,
			cancel_fields("12345", "1911"),
		);
		let result = driver.parse_response(&fields);
		assert_eq!(result.outcome, PaymentOutcome::Cancelled);
		assert_eq!(result.delivery, CallbackDelivery::Automatic);
		assert!(result.amount.is_none());
	}

	#[test]
	fn test_pending_response_from_descriptor_data() {
		let settings = gateway_settings("pendingbank", &[]);
		let driver = GatewayDriver::new("pendingbank", &PENDING_BANK, &settings).unwrap();
		let digest = driver.credentials().digest;
		let fields = bank_signed(&PENDING_BANK, digest, cancel_fields("12345", "1211"));
		assert_eq!(
			driver.parse_response(&fields).outcome,
			PaymentOutcome::Pending
		);
	}

	#[test]
	fn test_tampered_amount_is_invalid_signature() {
		let driver = driver("swedbank");
		let digest = driver.credentials().digest;
		let mut fields = bank_signed(&SWEDBANK, digest, paid_fields("12345", "12.50"));
		fields.insert(VK_AMOUNT.to_string(), "1250.00".to_string());

		let result = driver.parse_response(&fields);
		assert_eq!(result.outcome, PaymentOutcome::InvalidSignature);
		assert_eq!(result.defect, Some(ResponseDefect::SignatureMismatch));
		assert!(result.amount.is_none());
	}

	#[test]
	fn test_tampered_message_is_invalid_signature() {
		let driver = driver("swedbank");
		let digest = driver.credentials().digest;
		let mut fields = bank_signed(&SWEDBANK, digest, cancel_fields("12345", "1911"));
		fields.insert(VK_MSG.to_string(), "paid, honest".to_string());
		assert_eq!(
			driver.parse_response(&fields).outcome,
			PaymentOutcome::InvalidSignature
		);
	}

	#[test]
	fn test_tampered_status_is_invalid_signature() {
		let driver = driver("swedbank");
		let digest = driver.credentials().digest;

		// A signed paid response relabelled as a cancellation: every 1911
		// field is present, so only the signature can catch it.
		let mut fields = bank_signed(&SWEDBANK, digest, paid_fields("12345", "12.50"));
		fields.insert(VK_SERVICE.to_string(), "1911".to_string());
		let result = driver.parse_response(&fields);
		assert_eq!(result.outcome, PaymentOutcome::InvalidSignature);
		assert_eq!(result.defect, Some(ResponseDefect::SignatureMismatch));

		// And a signed cancellation relabelled as paid.
		let mut fields = bank_signed(&SWEDBANK, digest, paid_fields("12345", "12.50"));
		let cancelled = bank_signed(&SWEDBANK, digest, cancel_fields("12345", "1911"));
		fields.insert(VK_MAC.to_string(), cancelled[VK_MAC].clone());
		assert_eq!(
			driver.parse_response(&fields).outcome,
			PaymentOutcome::InvalidSignature
		);
	}

	#[test]
	fn test_merchant_signed_response_is_rejected() {
		let driver = driver("swedbank");
		let mut fields = paid_fields("12345", "12.50");
		let canonical = canonical_fields(Direction::Response, &SWEDBANK, &fields).unwrap();
		let mac = mac_string(&canonical).unwrap();
		let credentials = driver.credentials();
		let signature =
			sign(mac.as_bytes(), credentials.signing_key(), credentials.digest).unwrap();
		fields.insert(VK_MAC.to_string(), encode_signature(&signature));

		assert_eq!(driver.parse_response(&fields).outcome, PaymentOutcome::InvalidSignature);
	}

	#[test]
	fn test_unknown_status_code_is_malformed() {
		let driver = driver("swedbank");
		let mut fields = cancel_fields("12345", "1911");
		fields.insert(VK_SERVICE.to_string(), "1234".to_string());
		let fields = bank_signed(&PENDING_BANK_ANY, driver.credentials().digest, fields);

		let result = driver.parse_response(&fields);
		assert_eq!(result.outcome, PaymentOutcome::MalformedResponse);
		assert_eq!(
			result.defect,
			Some(ResponseDefect::UnknownService {
				code: "1234".to_string()
			})
		);
		assert_eq!(result.stamp.as_deref(), Some("12345"));
	}

	/// Accepts any service code layout the tests sign with.
	static PENDING_BANK_ANY: VariantDescriptor = VariantDescriptor {
		name: "anybank",
		display_name: "Any Bank",
		bank_url: "https://bank.example/pay",
		charset: "UTF-8",
		default_version: VERSION_009,
		versions: &[VERSION_009],
		request: REQUEST_1012,
		responses: &[ResponseLayout {
			service: "1234",
			outcome: PaymentOutcome::Paid,
			fields: RESPONSE_1911.fields,
		}],
		languages: &[],
		default_language: "EST",
	};

	#[test]
	fn test_missing_signature_is_malformed() {
		let driver = driver("swedbank");
		let result = driver.parse_response(&paid_fields("12345", "12.50"));
		assert_eq!(result.outcome, PaymentOutcome::MalformedResponse);
		assert_eq!(result.defect, Some(ResponseDefect::SignatureAbsent));
	}

	#[test]
	fn test_undecodable_signature_is_invalid() {
		let driver = driver("swedbank");
		let mut fields = paid_fields("12345", "12.50");
		fields.insert(VK_MAC.to_string(), "%%% not base64 %%%".to_string());
		let result = driver.parse_response(&fields);
		assert_eq!(result.outcome, PaymentOutcome::InvalidSignature);
		assert_eq!(result.defect, Some(ResponseDefect::SignatureUndecodable));
	}

	#[test]
	fn test_missing_field_is_malformed() {
		let driver = driver("swedbank");
		let mut fields = paid_fields("12345", "12.50");
		fields.remove(VK_T_NO);
		let result = driver.parse_response(&fields);
		assert_eq!(result.outcome, PaymentOutcome::MalformedResponse);
		assert_eq!(
			result.defect,
			Some(ResponseDefect::MissingField {
				field: VK_T_NO.to_string()
			})
		);
	}

	#[test]
	fn test_overlong_field_is_malformed() {
		let driver = driver("swedbank");
		let mut fields = paid_fields("12345", "12.50");
		fields.insert(VK_MSG.to_string(), "x".repeat(MAX_VALUE_LEN + 1));
		let result = driver.parse_response(&fields);
		assert!(matches!(
			result.defect,
			Some(ResponseDefect::FieldTooLong { .. })
		));
	}

	#[test]
	fn test_binding_checks_after_signature() {
		let driver = driver("swedbank");
		let digest = driver.credentials().digest;

		let mut wrong_recipient = paid_fields("12345", "12.50");
		wrong_recipient.insert(VK_REC_ID.to_string(), "OTHER".to_string());
		let result = driver.parse_response(&bank_signed(&SWEDBANK, digest, wrong_recipient));
		assert_eq!(result.outcome, PaymentOutcome::MalformedResponse);
		assert!(matches!(result.defect, Some(ResponseDefect::RecipientMismatch { .. })));

		let mut wrong_version = paid_fields("12345", "12.50");
		wrong_version.insert(VK_VERSION.to_string(), "008".to_string());
		let result = driver.parse_response(&bank_signed(&SWEDBANK, digest, wrong_version));
		assert!(matches!(result.defect, Some(ResponseDefect::VersionMismatch { .. })));

		let mut wrong_reference = paid_fields("12345", "12.50");
		wrong_reference.insert(VK_REF.to_string(), "123454".to_string());
		let result = driver.parse_response(&bank_signed(&SWEDBANK, digest, wrong_reference));
		assert!(matches!(result.defect, Some(ResponseDefect::ReferenceMismatch { .. })));

		let mut letters = paid_fields("12a45", "12.50");
		letters.insert(VK_REF.to_string(), reference_with_checksum("12a45"));
		let result = driver.parse_response(&bank_signed(&SWEDBANK, digest, letters));
		assert!(matches!(result.defect, Some(ResponseDefect::InvalidStamp { .. })));

		let bad_amount = paid_fields("12345", "12,50");
		let result = driver.parse_response(&bank_signed(&SWEDBANK, digest, bad_amount));
		assert!(matches!(result.defect, Some(ResponseDefect::InvalidAmount { .. })));
	}

	#[test]
	fn test_legacy_version_uses_sha1() {
		let driver = driver("luminor");
		assert_eq!(driver.credentials().version.code, "008");

		let mut fields = paid_fields("12345", "12.50");
		fields.insert(VK_VERSION.to_string(), "008".to_string());
		let signed = bank_signed(
			&banklink_protocol::variants::LUMINOR,
			banklink_crypto::DigestAlgorithm::Sha1,
			fields.clone(),
		);
		assert_eq!(driver.parse_response(&signed).outcome, PaymentOutcome::Paid);

		// Same response signed with the wrong digest does not verify.
		let signed = bank_signed(
			&banklink_protocol::variants::LUMINOR,
			banklink_crypto::DigestAlgorithm::Sha512,
			fields,
		);
		assert_eq!(driver.parse_response(&signed).outcome, PaymentOutcome::InvalidSignature);
	}

	#[test]
	fn test_availability() {
		let settings = gateway_settings("coop", &[]);
		let driver = GatewayDriver::from_settings("coop", &settings).unwrap();
		assert!(driver.is_available(Some("FI")));
		assert!(driver.is_available(None));

		let mut table = toml::Table::new();
		table.insert(
			"countries".to_string(),
			toml::Value::Array(vec![toml::Value::String("EE".into())]),
		);
		for (key, value) in [
			("variant", "coop"),
			("merchant_id", "SHOP"),
			("private_key", MERCHANT_KEYS.private_pem.as_str()),
			("public_key", BANK_KEYS.public_pem.as_str()),
		] {
			table.insert(key.to_string(), toml::Value::String(value.to_string()));
		}
		let settings = GatewaySettings::new("coop", table);
		let driver = GatewayDriver::from_settings("coop", &settings).unwrap();
		assert!(driver.is_available(Some("ee")));
		assert!(!driver.is_available(Some("LV")));
		assert!(!driver.is_available(None));

		let disabled = gateway_settings("coop", &[("enabled", "no")]);
		let driver = GatewayDriver::from_settings("coop", &disabled).unwrap();
		assert!(!driver.is_available(Some("EE")));
	}

	#[test]
	fn test_unknown_variant() {
		let settings = gateway_settings("nordea", &[]);
		let err = GatewayDriver::from_settings("nordea", &settings).unwrap_err();
		assert!(matches!(err, ConfigurationError::UnknownVariant { .. }));
	}

	#[test]
	fn test_variant_is_required() {
		let settings = gateway_settings("", &[]);
		let err = GatewayDriver::from_settings("swedbank", &settings).unwrap_err();
		assert!(matches!(
			err,
			ConfigurationError::MissingSetting {
				key: "variant",
				..
			}
		));
	}
}
