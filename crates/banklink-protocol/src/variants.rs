//! Bank variant descriptor table.
//!
//! Every supported bank speaks the same IPIZZA message shape. What differs
//! is data: the endpoint, the protocol versions it accepts (and with them
//! the digest and minimum key size), the language codes and which response
//! service codes it sends. Each bank is one [`VariantDescriptor`].

use crate::canonical::{Encoding, FieldRule, RequestLayout, ResponseLayout};
use crate::fields::*;
use banklink_crypto::DigestAlgorithm;
use banklink_types::PaymentOutcome;

/// A protocol version and the signing parameters it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
	/// Value of `VK_VERSION`.
	pub code: &'static str,
	pub digest: DigestAlgorithm,
	/// Smallest RSA modulus accepted for this version.
	pub min_key_bits: u32,
}

pub const VERSION_008: ProtocolVersion = ProtocolVersion {
	code: "008",
	digest: DigestAlgorithm::Sha1,
	min_key_bits: 1024,
};

pub const VERSION_009: ProtocolVersion = ProtocolVersion {
	code: "009",
	digest: DigestAlgorithm::Sha512,
	min_key_bits: 2048,
};

/// Data describing one bank's flavour of the protocol.
#[derive(Debug)]
pub struct VariantDescriptor {
	/// Configuration name, e.g. `swedbank`.
	pub name: &'static str,
	pub display_name: &'static str,
	/// Default payment endpoint.
	pub bank_url: &'static str,
	/// Value of `VK_ENCODING`.
	pub charset: &'static str,
	pub default_version: ProtocolVersion,
	/// Versions the bank accepts, preferred first.
	pub versions: &'static [ProtocolVersion],
	pub request: RequestLayout,
	pub responses: &'static [ResponseLayout],
	/// ISO 639-1 code to `VK_LANG` value.
	pub languages: &'static [(&'static str, &'static str)],
	pub default_language: &'static str,
}

impl VariantDescriptor {
	/// Looks up a supported protocol version by its code.
	pub fn version(&self, code: &str) -> Option<ProtocolVersion> {
		self.versions.iter().find(|v| v.code == code).copied()
	}

	/// Looks up the response layout for a service code.
	pub fn response_layout(&self, service: &str) -> Option<&ResponseLayout> {
		self.responses.iter().find(|layout| layout.service == service)
	}

	/// Maps a language or locale (`et`, `et_EE`, `EN`) to the bank's code.
	pub fn language_code(&self, language: &str) -> &'static str {
		let prefix: String = language
			.chars()
			.take(2)
			.collect::<String>()
			.to_ascii_lowercase();
		self.languages
			.iter()
			.find(|(iso, _)| *iso == prefix)
			.map(|(_, code)| *code)
			.unwrap_or(self.default_language)
	}
}

pub const REQUEST_1012: RequestLayout = RequestLayout {
	service: "1012",
	fields: &[
		FieldRule::new(VK_SERVICE, 4, Encoding::Trimmed),
		FieldRule::new(VK_VERSION, 3, Encoding::Trimmed),
		FieldRule::new(VK_SND_ID, 15, Encoding::Trimmed),
		FieldRule::new(VK_STAMP, 20, Encoding::Trimmed),
		FieldRule::new(VK_AMOUNT, 12, Encoding::Trimmed),
		FieldRule::new(VK_CURR, 3, Encoding::Uppercase),
		FieldRule::new(VK_REF, 35, Encoding::Trimmed),
		FieldRule::new(VK_MSG, 95, Encoding::Truncated),
		FieldRule::new(VK_RETURN, 255, Encoding::Verbatim),
		FieldRule::new(VK_CANCEL, 255, Encoding::Verbatim),
		FieldRule::new(VK_DATETIME, 24, Encoding::Verbatim),
	],
};

pub const RESPONSE_1111: ResponseLayout = ResponseLayout {
	service: "1111",
	outcome: PaymentOutcome::Paid,
	fields: &[
		FieldRule::new(VK_SERVICE, 4, Encoding::Verbatim),
		FieldRule::new(VK_VERSION, 3, Encoding::Verbatim),
		FieldRule::new(VK_SND_ID, 15, Encoding::Verbatim),
		FieldRule::new(VK_REC_ID, 15, Encoding::Verbatim),
		FieldRule::new(VK_STAMP, 20, Encoding::Verbatim),
		FieldRule::new(VK_T_NO, 20, Encoding::Verbatim),
		FieldRule::new(VK_AMOUNT, 12, Encoding::Verbatim),
		FieldRule::new(VK_CURR, 3, Encoding::Verbatim),
		FieldRule::new(VK_REC_ACC, 34, Encoding::Verbatim),
		FieldRule::new(VK_REC_NAME, 70, Encoding::Verbatim),
		FieldRule::new(VK_SND_ACC, 34, Encoding::Verbatim),
		FieldRule::new(VK_SND_NAME, 70, Encoding::Verbatim),
		FieldRule::new(VK_REF, 35, Encoding::Verbatim),
		FieldRule::new(VK_MSG, 95, Encoding::Verbatim),
		FieldRule::new(VK_T_DATETIME, 24, Encoding::Verbatim),
	],
};

pub const RESPONSE_1911: ResponseLayout = ResponseLayout {
	service: "1911",
	outcome: PaymentOutcome::Cancelled,
	fields: &[
		FieldRule::new(VK_SERVICE, 4, Encoding::Verbatim),
		FieldRule::new(VK_VERSION, 3, Encoding::Verbatim),
		FieldRule::new(VK_SND_ID, 15, Encoding::Verbatim),
		FieldRule::new(VK_REC_ID, 15, Encoding::Verbatim),
		FieldRule::new(VK_STAMP, 20, Encoding::Verbatim),
		FieldRule::new(VK_REF, 35, Encoding::Verbatim),
		FieldRule::new(VK_MSG, 95, Encoding::Verbatim),
	],
};

const IPIZZA_RESPONSES: &[ResponseLayout] = &[RESPONSE_1111, RESPONSE_1911];

const LANGUAGES: &[(&str, &str)] = &[
	("et", "EST"),
	("en", "ENG"),
	("ru", "RUS"),
	("lv", "LAT"),
	("lt", "LIT"),
	("fi", "FIN"),
];

const CURRENT_VERSIONS: &[ProtocolVersion] = &[VERSION_009, VERSION_008];
const LEGACY_VERSIONS: &[ProtocolVersion] = &[VERSION_008];

pub static SWEDBANK: VariantDescriptor = VariantDescriptor {
	name: "swedbank",
	display_name: "Swedbank",
	bank_url: "https://www.swedbank.ee/banklink",
	charset: "UTF-8",
	default_version: VERSION_009,
	versions: CURRENT_VERSIONS,
	request: REQUEST_1012,
	responses: IPIZZA_RESPONSES,
	languages: LANGUAGES,
	default_language: "EST",
};

pub static SEB: VariantDescriptor = VariantDescriptor {
	name: "seb",
	display_name: "SEB",
	bank_url: "https://www.seb.ee/cgi-bin/unet3.sh/un3min.r",
	charset: "UTF-8",
	default_version: VERSION_009,
	versions: CURRENT_VERSIONS,
	request: REQUEST_1012,
	responses: IPIZZA_RESPONSES,
	languages: LANGUAGES,
	default_language: "EST",
};

pub static LHV: VariantDescriptor = VariantDescriptor {
	name: "lhv",
	display_name: "LHV",
	bank_url: "https://www.lhv.ee/banklink",
	charset: "UTF-8",
	default_version: VERSION_009,
	versions: CURRENT_VERSIONS,
	request: REQUEST_1012,
	responses: IPIZZA_RESPONSES,
	languages: LANGUAGES,
	default_language: "EST",
};

pub static COOP: VariantDescriptor = VariantDescriptor {
	name: "coop",
	display_name: "Coop Pank",
	bank_url: "https://i.cooppank.ee/pay",
	charset: "UTF-8",
	default_version: VERSION_009,
	versions: CURRENT_VERSIONS,
	request: REQUEST_1012,
	responses: IPIZZA_RESPONSES,
	languages: LANGUAGES,
	default_language: "EST",
};

// Formerly Nordea.
pub static LUMINOR: VariantDescriptor = VariantDescriptor {
	name: "luminor",
	display_name: "Luminor",
	bank_url: "https://banklink.luminor.ee",
	charset: "UTF-8",
	default_version: VERSION_008,
	versions: LEGACY_VERSIONS,
	request: REQUEST_1012,
	responses: IPIZZA_RESPONSES,
	languages: LANGUAGES,
	default_language: "EST",
};

pub static DANSKE: VariantDescriptor = VariantDescriptor {
	name: "danske",
	display_name: "Danske Bank",
	bank_url: "https://e.danskebank.ee/ib/site/ibpay/login",
	charset: "UTF-8",
	default_version: VERSION_008,
	versions: LEGACY_VERSIONS,
	request: REQUEST_1012,
	responses: IPIZZA_RESPONSES,
	languages: LANGUAGES,
	default_language: "EST",
};

/// All built-in variants.
pub static VARIANTS: [&VariantDescriptor; 6] = [&SWEDBANK, &SEB, &LHV, &COOP, &LUMINOR, &DANSKE];

/// Finds a built-in variant by configuration name (case-insensitive).
pub fn find_variant(name: &str) -> Option<&'static VariantDescriptor> {
	VARIANTS
		.iter()
		.copied()
		.find(|variant| variant.name.eq_ignore_ascii_case(name.trim()))
}
