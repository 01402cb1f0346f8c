// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Thread-safe settlement log keyed by idempotency key.
//!
//! Combines a [`DashMap`] for O(1) key lookup with a [`SegQueue`] preserving
//! the order in which settlements reached a terminal state. The entry API
//! gives an atomic check-and-reserve, so two concurrent submissions of the
//! same key cannot both proceed.

use crate::base::SettlementId;
use crate::error::BillingError;
use crate::settlement::{IdempotencyKey, Settlement, SettlementStatus};
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Outcome of reserving an idempotency key.
#[derive(Debug)]
pub enum Reservation {
    /// The key is fresh (or its previous attempt failed); the caller owns
    /// the settlement attempt.
    New,
    /// The key already completed; the recorded settlement is replayed
    /// instead of settling again.
    Replay(Arc<Settlement>),
}

/// Idempotency-keyed settlement log.
#[derive(Debug, Default)]
pub struct SettlementLog {
    /// Settlements by idempotency key for replay and duplicate detection.
    settlements: DashMap<IdempotencyKey, Arc<Settlement>>,
    /// Settlement IDs in the order they reached a terminal state.
    order: SegQueue<SettlementId>,
}

impl SettlementLog {
    pub fn new() -> Self {
        Self {
            settlements: DashMap::new(),
            order: SegQueue::new(),
        }
    }

    /// Atomically claims `key` for a new settlement attempt.
    ///
    /// A completed key replays its settlement; a failed key may be retried
    /// and is re-claimed by the placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::DuplicateSettlement`] if another attempt with
    /// the same key is still in flight.
    pub fn reserve(
        &self,
        key: &IdempotencyKey,
        placeholder: Settlement,
    ) -> Result<Reservation, BillingError> {
        match self.settlements.entry(key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(placeholder));
                Ok(Reservation::New)
            }
            Entry::Occupied(mut entry) => match entry.get().status {
                SettlementStatus::Completed => Ok(Reservation::Replay(Arc::clone(entry.get()))),
                SettlementStatus::Failed => {
                    entry.insert(Arc::new(placeholder));
                    Ok(Reservation::New)
                }
                SettlementStatus::Pending | SettlementStatus::Processing => {
                    Err(BillingError::DuplicateSettlement)
                }
            },
        }
    }

    /// Stores the terminal record for a reserved key.
    pub fn record(&self, settlement: Settlement) {
        debug_assert!(settlement.status.is_terminal());
        let id = settlement.id;
        self.settlements
            .insert(settlement.idempotency_key.clone(), Arc::new(settlement));
        self.order.push(id);
    }

    /// Releases a reservation without recording anything. Used when
    /// validation rejects the settlement and the same key should be usable
    /// for a fresh attempt after re-selection.
    pub fn release(&self, key: &IdempotencyKey) {
        self.settlements.remove(key);
    }

    pub fn get(&self, key: &IdempotencyKey) -> Option<Arc<Settlement>> {
        self.settlements.get(key).map(|entry| Arc::clone(&entry))
    }
}
