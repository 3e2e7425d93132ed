//! Per-wallet nonce reservation.
//!
//! Reservation is one atomic increment in the store. Reserved nonces that
//! never reach the chain leave gaps, which the wallet contract tolerates.

use std::sync::Arc;

use zkms_core::WalletId;
use zkms_store::{MultisigStore, StoreError};

use crate::error::{CoordinatorError, Result};

#[derive(Clone)]
pub struct NonceReservation {
    store: Arc<dyn MultisigStore>,
}

impl NonceReservation {
    pub fn new(store: Arc<dyn MultisigStore>) -> Self {
        Self { store }
    }

    /// Reserve the next nonce for `wallet`. Concurrent callers always get
    /// distinct values.
    pub async fn reserve(&self, wallet: WalletId) -> Result<u64> {
        let nonce = self
            .store
            .reserve_nonce(wallet)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => CoordinatorError::not_found("wallet", wallet),
                other => other.into(),
            })?;
        tracing::debug!(wallet_id = %wallet, nonce, "Nonce reserved");
        Ok(nonce)
    }
}
