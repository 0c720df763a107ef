//! Logs gateway events at the severity they deserve.

use banklink_types::{GatewayEvent, PaymentOutcome};

/// Forwards events to the tracing subscriber.
///
/// Forged callbacks are errors, other rejected callbacks are warnings,
/// status changes are informational and duplicates are debug noise.
pub fn report(events: &[GatewayEvent]) {
	for event in events {
		match event {
			GatewayEvent::RedirectIssued {
				gateway,
				order_id,
				reference,
			} => {
				tracing::info!(%gateway, %order_id, %reference, "Issued bank redirect");
			},
			GatewayEvent::PaymentConfirmed {
				gateway,
				order_id,
				transaction_id,
			} => {
				tracing::info!(
					%gateway,
					%order_id,
					transaction_id = transaction_id.as_deref().unwrap_or("-"),
					"Payment confirmed"
				);
			},
			GatewayEvent::PaymentPending { gateway, order_id } => {
				tracing::info!(%gateway, %order_id, "Payment pending");
			},
			GatewayEvent::PaymentCancelled { gateway, order_id } => {
				tracing::info!(%gateway, %order_id, "Payment cancelled");
			},
			GatewayEvent::CallbackRejected {
				gateway,
				outcome,
				stamp,
				reason,
			} => {
				let stamp = stamp.as_deref().unwrap_or("-");
				if *outcome == PaymentOutcome::InvalidSignature {
					tracing::error!(
						%gateway,
						%stamp,
						%reason,
						"Rejected callback with invalid signature"
					);
				} else {
					tracing::warn!(%gateway, %stamp, %outcome, %reason, "Rejected callback");
				}
			},
			GatewayEvent::DuplicateCallback {
				gateway,
				order_id,
				status,
			} => {
				tracing::debug!(%gateway, %order_id, %status, "Duplicate callback");
			},
			GatewayEvent::TransitionRefused {
				gateway,
				order_id,
				from,
				to,
			} => {
				tracing::warn!(
					%gateway,
					%order_id,
					%from,
					%to,
					"Order store refused status change"
				);
			},
		}
	}
}
