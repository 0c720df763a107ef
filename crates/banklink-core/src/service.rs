//! Gateway service: drivers plus the Order Store.
//!
//! Builds payment forms for orders and applies verified callbacks to the
//! Order Store. Payment steps are returned as [`GatewayEvent`]s for the
//! caller's observer.

use crate::{GatewayDriver, GatewayError};
use banklink_config::{Config, SettingsProvider};
use banklink_storage::{OrderStore, StorageError};
use banklink_types::{
	FieldMap, GatewayEvent, Order, OrderStatus, PaymentForm, PaymentOutcome, ResponseDefect,
	StatusChange, VerificationResult,
};
use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Signed form for an order, ready for the Form Renderer.
#[derive(Debug, Clone)]
pub struct PreparedPayment {
	pub form: PaymentForm,
	pub events: Vec<GatewayEvent>,
}

/// What handling one bank callback did.
#[derive(Debug, Clone)]
pub struct CallbackReport {
	pub result: VerificationResult,
	pub events: Vec<GatewayEvent>,
	/// Order status after the callback, when the order is known.
	pub status: Option<OrderStatus>,
	/// Where to send the buyer next, when the order is known.
	pub redirect_url: Option<String>,
}

/// Configured gateways sharing one Order Store.
pub struct GatewayService {
	store: Arc<dyn OrderStore>,
	drivers: HashMap<String, GatewayDriver>,
}

impl GatewayService {
	pub fn new(store: Arc<dyn OrderStore>) -> Self {
		Self {
			store,
			drivers: HashMap::new(),
		}
	}

	/// Builds a driver for every enabled gateway in the configuration.
	///
	/// Disabled gateways are skipped, so they need no keys.
	pub fn from_config(config: &Config, store: Arc<dyn OrderStore>) -> Result<Self, GatewayError> {
		let mut service = Self::new(store);
		for name in config.gateway_names() {
			let settings = config.gateway_settings(name)?;
			if !settings.get_flag("enabled", true) {
				tracing::debug!(gateway = %name, "Skipping disabled gateway");
				continue;
			}
			service.register(GatewayDriver::from_settings(name, &settings)?);
		}
		Ok(service)
	}

	/// Adds or replaces a driver under its own name.
	pub fn register(&mut self, driver: GatewayDriver) {
		self.drivers.insert(driver.name().to_string(), driver);
	}

	pub fn driver(&self, gateway: &str) -> Option<&GatewayDriver> {
		self.drivers.get(gateway)
	}

	/// Names of gateways a buyer from `country` may use, sorted.
	pub fn available_gateways(&self, country: Option<&str>) -> Vec<&str> {
		let mut names: Vec<&str> = self
			.drivers
			.values()
			.filter(|driver| driver.is_available(country))
			.map(GatewayDriver::name)
			.collect();
		names.sort_unstable();
		names
	}

	/// Starts a payment: returns the checkout page that will render the
	/// bank form for the order.
	pub async fn process_payment(
		&self,
		gateway: &str,
		order_id: &str,
	) -> Result<String, GatewayError> {
		let driver = self.require_driver(gateway)?;
		let order = self.store.get_order(order_id).await?;
		if !driver.is_available(order.billing_country.as_deref()) {
			return Err(GatewayError::Unavailable {
				gateway: gateway.to_string(),
				order_id: order_id.to_string(),
			});
		}
		Ok(self.store.get_checkout_redirect_url(order_id).await?)
	}

	/// Builds the signed bank form for an order and marks the redirect
	/// as issued.
	#[instrument(skip_all, fields(gateway = %gateway, order_id = %order_id))]
	pub async fn prepare_payment(
		&self,
		gateway: &str,
		order_id: &str,
		now: DateTime<FixedOffset>,
	) -> Result<PreparedPayment, GatewayError> {
		let driver = self.require_driver(gateway)?;
		let order = self.store.get_order(order_id).await?;
		if order.status == OrderStatus::Paid {
			return Err(GatewayError::AlreadyPaid(order_id.to_string()));
		}

		let request = driver.payment_request(&order, now)?;
		let form = driver.build_request(&request)?;
		self.store
			.set_status(order_id, OrderStatus::RedirectIssued, None)
			.await?;

		Ok(PreparedPayment {
			form,
			events: vec![GatewayEvent::RedirectIssued {
				gateway: gateway.to_string(),
				order_id: order_id.to_string(),
				reference: request.reference,
			}],
		})
	}

	/// Verifies a bank callback and applies its outcome to the order.
	///
	/// Rejected callbacks leave the order untouched. A paid callback must
	/// also match the order's amount and currency. Repeated callbacks are
	/// reported as duplicates and change nothing.
	#[instrument(skip_all, fields(gateway = %gateway))]
	pub async fn handle_callback(
		&self,
		gateway: &str,
		fields: &FieldMap,
	) -> Result<CallbackReport, GatewayError> {
		let driver = self.require_driver(gateway)?;
		let mut result = driver.parse_response(fields);

		let order = match result.stamp.as_deref() {
			Some(stamp) => match self.store.get_order(stamp).await {
				Ok(order) => Some(order),
				Err(StorageError::NotFound) => None,
				Err(e) => return Err(e.into()),
			},
			None => None,
		};

		if result.outcome.is_authentic() {
			let Some(order) = order else {
				return Err(GatewayError::UnknownOrder(
					result.stamp.clone().unwrap_or_default(),
				));
			};
			let Some(defect) = payment_mismatch(&result, &order) else {
				return self.apply_outcome(gateway, result, order).await;
			};
			let stamp = result.stamp.take();
			result = VerificationResult::malformed(gateway, defect).with_stamp(stamp);
			return Ok(rejected_report(gateway, result, Some(order)));
		}

		Ok(rejected_report(gateway, result, order))
	}

	async fn apply_outcome(
		&self,
		gateway: &str,
		result: VerificationResult,
		order: Order,
	) -> Result<CallbackReport, GatewayError> {
		let target = match result.outcome {
			PaymentOutcome::Paid => OrderStatus::Paid,
			PaymentOutcome::Pending => OrderStatus::Pending,
			_ => OrderStatus::Cancelled,
		};

		let (event, status) = match self
			.store
			.set_status(&order.id, target, result.transaction_id.clone())
			.await
		{
			Ok(StatusChange::Applied { .. }) => {
				(applied_event(gateway, &order.id, &result), target)
			},
			Ok(StatusChange::Unchanged) => (
				GatewayEvent::DuplicateCallback {
					gateway: gateway.to_string(),
					order_id: order.id.clone(),
					status: target,
				},
				target,
			),
			Err(StorageError::InvalidTransition { from, to, .. }) => (
				GatewayEvent::TransitionRefused {
					gateway: gateway.to_string(),
					order_id: order.id.clone(),
					from,
					to,
				},
				from,
			),
			Err(e) => return Err(e.into()),
		};

		Ok(CallbackReport {
			redirect_url: redirect_for(&order, status),
			status: Some(status),
			events: vec![event],
			result,
		})
	}

	fn require_driver(&self, gateway: &str) -> Result<&GatewayDriver, GatewayError> {
		self.drivers
			.get(gateway)
			.ok_or_else(|| GatewayError::UnknownGateway(gateway.to_string()))
	}
}

fn payment_mismatch(result: &VerificationResult, order: &Order) -> Option<ResponseDefect> {
	if result.outcome != PaymentOutcome::Paid {
		return None;
	}
	let amount = result.amount.unwrap_or_default();
	let currency = result.currency.clone().unwrap_or_default();
	if amount == order.amount && currency.eq_ignore_ascii_case(&order.currency) {
		return None;
	}
	Some(ResponseDefect::AmountMismatch {
		expected: order.amount,
		actual: amount,
		currency_expected: order.currency.clone(),
		currency_actual: currency,
	})
}

fn applied_event(gateway: &str, order_id: &str, result: &VerificationResult) -> GatewayEvent {
	match result.outcome {
		PaymentOutcome::Paid => GatewayEvent::PaymentConfirmed {
			gateway: gateway.to_string(),
			order_id: order_id.to_string(),
			transaction_id: result.transaction_id.clone(),
		},
		PaymentOutcome::Pending => GatewayEvent::PaymentPending {
			gateway: gateway.to_string(),
			order_id: order_id.to_string(),
		},
		_ => GatewayEvent::PaymentCancelled {
			gateway: gateway.to_string(),
			order_id: order_id.to_string(),
		},
	}
}

fn rejected_report(
	gateway: &str,
	result: VerificationResult,
	order: Option<Order>,
) -> CallbackReport {
	let event = GatewayEvent::CallbackRejected {
		gateway: gateway.to_string(),
		outcome: result.outcome,
		stamp: result.stamp.clone(),
		reason: result
			.defect
			.as_ref()
			.map(ToString::to_string)
			.unwrap_or_default(),
	};
	CallbackReport {
		status: order.as_ref().map(|o| o.status),
		redirect_url: order.as_ref().and_then(|o| redirect_for(o, o.status)),
		events: vec![event],
		result,
	}
}

/// Paid and pending orders go to the return page, everything else to the
/// cancel page.
fn redirect_for(order: &Order, status: OrderStatus) -> Option<String> {
	let url = match status {
		OrderStatus::Paid | OrderStatus::Pending => &order.return_url,
		_ => &order.cancel_url,
	};
	Some(url.clone()).filter(|u| !u.is_empty())
}
