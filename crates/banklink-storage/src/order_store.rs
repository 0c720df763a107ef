//! Order Store used by the gateway.
//!
//! The gateway itself holds no locks. Every status change is a
//! check-then-set whose write succeeds only if the record is unchanged
//! since it was read, so a repeated or concurrent `Paid` callback is applied
//! exactly once even when several processes share the backend.

use crate::{StorageError, StorageService};
use async_trait::async_trait;
use banklink_types::{current_timestamp, Order, OrderStatus, StatusChange, StorageKey};
use tracing::instrument;

/// Attempts before a contended status change gives up.
const MAX_STATUS_ATTEMPTS: usize = 16;

/// Orders as seen by the gateway.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Loads an order by id.
	async fn get_order(&self, id: &str) -> Result<Order, StorageError>;

	/// Moves an order to `status`.
	///
	/// Setting the status the order already has is reported as
	/// [`StatusChange::Unchanged`] and writes nothing. A change the status
	/// table forbids fails with [`StorageError::InvalidTransition`].
	/// `transaction` is recorded when the order becomes paid.
	async fn set_status(
		&self,
		id: &str,
		status: OrderStatus,
		transaction: Option<String>,
	) -> Result<StatusChange, StorageError>;

	/// Returns the page that renders the bank form for an order.
	async fn get_checkout_redirect_url(&self, id: &str) -> Result<String, StorageError>;

	/// Creates or replaces an order record.
	async fn insert_order(&self, order: &Order) -> Result<(), StorageError>;
}

/// [`OrderStore`] backed by a [`StorageService`].
pub struct StorageOrderStore {
	storage: StorageService,
}

impl StorageOrderStore {
	pub fn new(storage: StorageService) -> Self {
		Self { storage }
	}
}

#[async_trait]
impl OrderStore for StorageOrderStore {
	async fn get_order(&self, id: &str) -> Result<Order, StorageError> {
		self.storage.retrieve(StorageKey::Orders.as_str(), id).await
	}

	#[instrument(skip_all, fields(order_id = %id, status = %status))]
	async fn set_status(
		&self,
		id: &str,
		status: OrderStatus,
		transaction: Option<String>,
	) -> Result<StatusChange, StorageError> {
		let namespace = StorageKey::Orders.as_str();

		for _ in 0..MAX_STATUS_ATTEMPTS {
			let (mut order, snapshot): (Order, _) =
				self.storage.retrieve_snapshot(namespace, id).await?;
			let from = order.status;

			if from == status {
				tracing::debug!("Status already set");
				return Ok(StatusChange::Unchanged);
			}
			if !from.can_transition_to(&status) {
				return Err(StorageError::InvalidTransition {
					order_id: id.to_string(),
					from,
					to: status,
				});
			}

			order.status = status;
			if status == OrderStatus::Paid {
				order.bank_transaction = transaction.clone();
			}
			order.updated_at = current_timestamp();

			if self.storage.replace(namespace, id, &snapshot, &order).await? {
				tracing::debug!(%from, "Status updated");
				return Ok(StatusChange::Applied { from });
			}
			tracing::debug!("Order changed concurrently, re-reading");
		}

		Err(StorageError::Backend(format!(
			"Order {} kept changing during status update",
			id
		)))
	}

	async fn get_checkout_redirect_url(&self, id: &str) -> Result<String, StorageError> {
		let order = self.get_order(id).await?;
		if order.checkout_url.is_empty() {
			return Err(StorageError::NotFound);
		}
		Ok(order.checkout_url)
	}

	async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::file::FileStorage;
	use crate::implementations::memory::MemoryStorage;
	use std::sync::Arc;

	fn memory_store() -> StorageOrderStore {
		StorageOrderStore::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	async fn store_with_order(status: OrderStatus) -> StorageOrderStore {
		let store = memory_store();
		let mut order = Order::new("1001", 1250, "EUR");
		order.status = status;
		order.checkout_url = "https://shop.example/checkout/1001".to_string();
		store.insert_order(&order).await.unwrap();
		store
	}

	#[tokio::test]
	async fn test_paid_applied_once() {
		let store = store_with_order(OrderStatus::RedirectIssued).await;

		let first = store
			.set_status("1001", OrderStatus::Paid, Some("T-1".into()))
			.await
			.unwrap();
		assert_eq!(
			first,
			StatusChange::Applied {
				from: OrderStatus::RedirectIssued
			}
		);

		let second = store
			.set_status("1001", OrderStatus::Paid, Some("T-2".into()))
			.await
			.unwrap();
		assert_eq!(second, StatusChange::Unchanged);

		let order = store.get_order("1001").await.unwrap();
		assert_eq!(order.status, OrderStatus::Paid);
		assert_eq!(order.bank_transaction.as_deref(), Some("T-1"));
	}

	#[tokio::test]
	async fn test_concurrent_paid_applied_once() {
		let store = Arc::new(store_with_order(OrderStatus::RedirectIssued).await);

		let handles: Vec<_> = (0..8)
			.map(|i| {
				let store = Arc::clone(&store);
				tokio::spawn(async move {
					store
						.set_status("1001", OrderStatus::Paid, Some(format!("T-{}", i)))
						.await
						.unwrap()
				})
			})
			.collect();

		let mut applied = 0;
		for handle in handles {
			if matches!(handle.await.unwrap(), StatusChange::Applied { .. }) {
				applied += 1;
			}
		}
		assert_eq!(applied, 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_paid_applied_once_across_file_stores() {
		let temp_dir = tempfile::TempDir::new().unwrap();
		let path = temp_dir.path().to_path_buf();
		let file_store = |path: &std::path::Path| {
			Arc::new(StorageOrderStore::new(StorageService::new(Box::new(
				FileStorage::new(path.to_path_buf()),
			))))
		};

		// Bank callback and buyer return, each with its own store as in
		// separate processes.
		let bank = file_store(&path);
		let buyer = file_store(&path);

		for round in 0..25 {
			let id = format!("{}", 2000 + round);
			let mut order = Order::new(id.clone(), 1250, "EUR");
			order.status = OrderStatus::RedirectIssued;
			bank.insert_order(&order).await.unwrap();

			let callers = [(Arc::clone(&bank), "AUTO"), (Arc::clone(&buyer), "RETURN")];
			let handles: Vec<_> = callers
				.into_iter()
				.map(|(store, transaction)| {
					let id = id.clone();
					tokio::spawn(async move {
						store
							.set_status(&id, OrderStatus::Paid, Some(transaction.to_string()))
							.await
							.unwrap()
					})
				})
				.collect();

			let mut applied = 0;
			for handle in handles {
				if matches!(handle.await.unwrap(), StatusChange::Applied { .. }) {
					applied += 1;
				}
			}
			assert_eq!(applied, 1, "round {}", round);
			assert_eq!(buyer.get_order(&id).await.unwrap().status, OrderStatus::Paid);
		}
	}

	#[tokio::test]
	async fn test_paid_order_cannot_be_cancelled() {
		let store = store_with_order(OrderStatus::Paid).await;
		let result = store
			.set_status("1001", OrderStatus::Cancelled, None)
			.await;
		assert!(matches!(
			result,
			Err(StorageError::InvalidTransition {
				from: OrderStatus::Paid,
				to: OrderStatus::Cancelled,
				..
			})
		));
		assert_eq!(
			store.get_order("1001").await.unwrap().status,
			OrderStatus::Paid
		);
	}

	#[tokio::test]
	async fn test_transaction_only_recorded_on_paid() {
		let store = store_with_order(OrderStatus::RedirectIssued).await;
		store
			.set_status("1001", OrderStatus::Pending, Some("T-9".into()))
			.await
			.unwrap();
		assert!(store.get_order("1001").await.unwrap().bank_transaction.is_none());
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let store = memory_store();
		assert!(matches!(
			store.set_status("404", OrderStatus::Paid, None).await,
			Err(StorageError::NotFound)
		));
		assert!(matches!(
			store.get_checkout_redirect_url("404").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_checkout_redirect_url() {
		let store = store_with_order(OrderStatus::Created).await;
		assert_eq!(
			store.get_checkout_redirect_url("1001").await.unwrap(),
			"https://shop.example/checkout/1001"
		);
	}

	#[tokio::test]
	async fn test_file_backed_store_persists_status() {
		let temp_dir = tempfile::TempDir::new().unwrap();
		let path = temp_dir.path().to_path_buf();

		let store = StorageOrderStore::new(StorageService::new(Box::new(FileStorage::new(
			path.clone(),
		))));
		let mut order = Order::new("1001", 500, "EUR");
		order.status = OrderStatus::RedirectIssued;
		store.insert_order(&order).await.unwrap();
		store
			.set_status("1001", OrderStatus::Cancelled, None)
			.await
			.unwrap();

		let reopened =
			StorageOrderStore::new(StorageService::new(Box::new(FileStorage::new(path))));
		assert_eq!(
			reopened.get_order("1001").await.unwrap().status,
			OrderStatus::Cancelled
		);
	}
}
