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

//! Billing engine.
//!
//! The [`BillingEngine`] is the central component: it owns the guest
//! accounts, the bracelet index, the room directory, and the settlement
//! log, and orchestrates the scan → charge listing → credit check →
//! settlement workflow.
//!
//! # Concurrency
//!
//! Guest accounts live in a [`DashMap`], so operations on different guests
//! proceed fully in parallel. All operations against one guest's ledger and
//! credit are serialized by that guest's account mutex, which makes
//! `reserve_and_debit` and `mark_paid` atomic against concurrent scans and
//! settlements for the same bracelet.

use crate::base::{BraceletCode, ChargeId, GuestId, RoomId, SettlementId};
use crate::charge::{Charge, NewCharge};
use crate::credit::CreditBalance;
use crate::error::BillingError;
use crate::guest::{Guest, GuestAccount, GuestSummary};
use crate::room::{Room, RoomStatus};
use crate::settlement::{
    IdempotencyKey, PaymentGateway, PaymentMethod, Settlement, SettlementStatus,
};
use crate::settlement_log::{Reservation, SettlementLog};
use crate::stats::DashboardStats;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Billing engine managing guest accounts, rooms, and settlements.
///
/// # Invariants
///
/// - A bracelet code maps to at most one active guest; codes are scoped to
///   a single stay and invalidated at checkout.
/// - `available == initial - used` for every credit account, always.
/// - A settlement either commits fully (debit + mark paid) or mutates
///   nothing.
/// - Paid charges are immutable; there is no un-pay operation.
pub struct BillingEngine {
    /// Guest accounts indexed by guest ID. `Arc` so a settlement can run
    /// without pinning a map shard across the gateway call.
    accounts: DashMap<GuestId, Arc<GuestAccount>>,
    /// Active bracelet codes.
    bracelets: DashMap<BraceletCode, GuestId>,
    /// Room directory.
    rooms: DashMap<RoomId, Room>,
    /// Settlement log for idempotent submission.
    settlements: SettlementLog,
    next_charge_id: AtomicU64,
    next_settlement_id: AtomicU64,
    gateway_timeout: Duration,
}

impl BillingEngine {
    /// Creates an engine with no guests or rooms.
    pub fn new() -> Self {
        BillingEngine {
            accounts: DashMap::new(),
            bracelets: DashMap::new(),
            rooms: DashMap::new(),
            settlements: SettlementLog::new(),
            next_charge_id: AtomicU64::new(1),
            next_settlement_id: AtomicU64::new(1),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    /// Overrides the bound on how long a gateway call may block.
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    // === Guests & bracelets ===

    /// Checks a guest in: opens the account with the given credit limit,
    /// binds the bracelet code, and marks the assigned room occupied.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidAmount`] - Negative credit limit.
    /// - [`BillingError::BraceletInUse`] - Code is bound to another stay.
    /// - [`BillingError::DuplicateGuest`] - Guest ID is already checked in.
    /// - [`BillingError::RoomNotFound`] - Assigned room does not exist.
    pub fn check_in(&self, guest: Guest, initial_credit: Decimal) -> Result<(), BillingError> {
        if let Some(room_id) = guest.room_id {
            if !self.rooms.contains_key(&room_id) {
                return Err(BillingError::RoomNotFound);
            }
        }

        let guest_id = guest.id;
        let code = guest.bracelet_code.clone();
        let room_id = guest.room_id;
        let account = Arc::new(GuestAccount::new(guest, initial_credit)?);

        // Bind the bracelet first; entry API makes the check-and-insert
        // atomic so one code never maps to two active guests.
        match self.bracelets.entry(code.clone()) {
            Entry::Occupied(_) => return Err(BillingError::BraceletInUse),
            Entry::Vacant(entry) => {
                entry.insert(guest_id);
            }
        }

        match self.accounts.entry(guest_id) {
            Entry::Occupied(_) => {
                self.bracelets.remove(&code);
                return Err(BillingError::DuplicateGuest);
            }
            Entry::Vacant(entry) => {
                entry.insert(account);
            }
        }

        if let Some(room_id) = room_id {
            if let Some(mut room) = self.rooms.get_mut(&room_id) {
                room.status = RoomStatus::Occupied;
                room.guest_id = Some(guest_id);
            }
        }

        debug!(guest = %guest_id, bracelet = %code, "guest checked in");
        Ok(())
    }

    /// Maps a scanned bracelet code to the guest it identifies.
    ///
    /// A code that was never issued, or that was invalidated at checkout,
    /// returns [`BillingError::BraceletNotFound`]; no state is created.
    pub fn lookup_bracelet(&self, code: &BraceletCode) -> Result<GuestSummary, BillingError> {
        let guest_id = *self
            .bracelets
            .get(code)
            .ok_or(BillingError::BraceletNotFound)?;
        let account = self.account(guest_id)?;
        Ok(account.summary())
    }

    /// Ends a stay: invalidates the bracelet code, closes the account for
    /// new charges, and flips the room to checkout status. Pending charges
    /// survive and remain settleable.
    pub fn check_out(&self, guest_id: GuestId) -> Result<(), BillingError> {
        let account = self.account(guest_id)?;
        account.check_out()?;

        let guest = account.guest();
        self.bracelets.remove(&guest.bracelet_code);
        if let Some(room_id) = guest.room_id {
            if let Some(mut room) = self.rooms.get_mut(&room_id) {
                room.status = RoomStatus::Checkout;
            }
        }

        debug!(guest = %guest_id, "guest checked out");
        Ok(())
    }

    pub fn guest(&self, guest_id: GuestId) -> Option<GuestSummary> {
        self.accounts.get(&guest_id).map(|account| account.summary())
    }

    /// All guest summaries, in guest ID order.
    pub fn guests(&self) -> Vec<GuestSummary> {
        let mut summaries: Vec<GuestSummary> = self
            .accounts
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        summaries.sort_by_key(|s| s.guest.id.0);
        summaries
    }

    /// Returns an iterator over all guest accounts.
    ///
    /// Useful for generating output reports of account states.
    pub fn accounts(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, GuestId, Arc<GuestAccount>>>
    {
        self.accounts.iter()
    }

    // === Charges & credit ===

    /// Posts a charge against a guest's stay and returns the stored record.
    pub fn add_charge(
        &self,
        guest_id: GuestId,
        new_charge: NewCharge,
    ) -> Result<Charge, BillingError> {
        if new_charge.amount <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount);
        }
        let account = self.account(guest_id)?;

        let charge = Charge {
            id: ChargeId(self.next_charge_id.fetch_add(1, Ordering::Relaxed)),
            guest_id,
            description: new_charge.description,
            amount: new_charge.amount,
            timestamp: Utc::now(),
            area: new_charge.area,
            source: new_charge.source,
            paid: false,
            items: new_charge.items,
        };
        account.post_charge(charge.clone())?;
        Ok(charge)
    }

    /// All charges for a guest in posting order.
    pub fn charges(&self, guest_id: GuestId) -> Result<Vec<Charge>, BillingError> {
        Ok(self.account(guest_id)?.charges())
    }

    /// Credit balance snapshot: `{initial, used, available}`.
    pub fn credit(&self, guest_id: GuestId) -> Result<CreditBalance, BillingError> {
        Ok(self.account(guest_id)?.credit_balance())
    }

    /// Settlement history for a guest, oldest first.
    pub fn transactions(&self, guest_id: GuestId) -> Result<Vec<Settlement>, BillingError> {
        Ok(self.account(guest_id)?.settlements())
    }

    // === Settlement ===

    /// Settles the selected pending charges for a guest.
    ///
    /// Validation and commit run under the guest's account lock as one
    /// logical unit: for the credit-account method the credit is debited
    /// and the charges marked paid together, or neither happens. The card
    /// method calls the gateway with a bounded timeout and mutates nothing
    /// unless the gateway confirms.
    ///
    /// Resubmitting a completed `idempotency_key` replays the recorded
    /// settlement instead of debiting twice. A key whose attempt failed at
    /// the gateway may be retried.
    ///
    /// # Errors
    ///
    /// - [`BillingError::GuestNotFound`] - Unknown guest.
    /// - [`BillingError::EmptySelection`] - No charges selected.
    /// - [`BillingError::ChargeNotFound`] - Selection references an unknown
    ///   charge.
    /// - [`BillingError::AlreadyPaid`] - Every selected charge is already
    ///   settled.
    /// - [`BillingError::StaleCharge`] - Part of the selection was settled
    ///   concurrently.
    /// - [`BillingError::InsufficientCredit`] - Total exceeds available
    ///   credit.
    /// - [`BillingError::DuplicateSettlement`] - Same key is in flight.
    /// - [`BillingError::GatewayTimeout`] / [`BillingError::GatewayDeclined`]
    ///   - Card path failed; recorded as a `Failed` settlement, retryable
    ///   with the same key.
    pub fn settle(
        &self,
        guest_id: GuestId,
        selection: &[ChargeId],
        method: PaymentMethod,
        idempotency_key: IdempotencyKey,
        gateway: &dyn PaymentGateway,
    ) -> Result<Settlement, BillingError> {
        let account = self.account(guest_id)?;
        if selection.is_empty() {
            return Err(BillingError::EmptySelection);
        }

        let id = SettlementId(self.next_settlement_id.fetch_add(1, Ordering::Relaxed));
        let placeholder = Settlement {
            id,
            guest_id,
            charge_ids: selection.to_vec(),
            total: Decimal::ZERO,
            status: SettlementStatus::Processing,
            method: method.clone(),
            timestamp: Utc::now(),
            gateway_reference: None,
            idempotency_key: idempotency_key.clone(),
        };

        match self.settlements.reserve(&idempotency_key, placeholder)? {
            Reservation::Replay(settlement) => {
                debug!(guest = %guest_id, key = %idempotency_key, "replaying completed settlement");
                return Ok((*settlement).clone());
            }
            Reservation::New => {}
        }

        match account.settle(selection, &method, &idempotency_key, gateway, self.gateway_timeout)
        {
            Ok(outcome) => {
                let settlement = Settlement {
                    id,
                    guest_id,
                    charge_ids: selection.to_vec(),
                    total: outcome.total,
                    status: SettlementStatus::Completed,
                    method,
                    timestamp: Utc::now(),
                    gateway_reference: outcome.gateway_reference,
                    idempotency_key,
                };
                self.settlements.record(settlement.clone());
                account.record_settlement(settlement.clone());
                debug!(guest = %guest_id, settlement = %id, total = %settlement.total, "settlement committed");
                Ok(settlement)
            }
            Err(err @ (BillingError::GatewayTimeout | BillingError::GatewayDeclined)) => {
                // Gateway failure is a terminal settlement: audited and
                // retryable with the same key, ledger and credit untouched.
                let total = account.selection_total(selection).unwrap_or(Decimal::ZERO);
                let settlement = Settlement {
                    id,
                    guest_id,
                    charge_ids: selection.to_vec(),
                    total,
                    status: SettlementStatus::Failed,
                    method,
                    timestamp: Utc::now(),
                    gateway_reference: None,
                    idempotency_key,
                };
                self.settlements.record(settlement.clone());
                account.record_settlement(settlement);
                warn!(guest = %guest_id, settlement = %id, error = %err, "gateway settlement failed");
                Err(err)
            }
            Err(err) => {
                // Validation rejection: no settlement record; the key is
                // freed so the caller can re-select and resubmit.
                self.settlements.release(&idempotency_key);
                debug!(guest = %guest_id, error = %err, "settlement rejected");
                Err(err)
            }
        }
    }

    /// Looks up a settlement by idempotency key.
    ///
    /// Only terminal records are visible; an attempt still in flight returns
    /// `None` until it completes or fails.
    pub fn settlement(&self, key: &IdempotencyKey) -> Option<Settlement> {
        self.settlements
            .get(key)
            .filter(|s| s.status.is_terminal())
            .map(|s| (*s).clone())
    }

    // === Rooms & stats ===

    /// Adds (or replaces) a room directory entry.
    pub fn add_room(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    /// All rooms in room ID order.
    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by_key(|r| r.id.0);
        rooms
    }

    /// Updates a room's status, returning the updated entry.
    pub fn update_room_status(
        &self,
        room_id: RoomId,
        status: RoomStatus,
    ) -> Result<Room, BillingError> {
        let mut room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(BillingError::RoomNotFound)?;
        room.status = status;
        Ok(room.clone())
    }

    /// Dashboard statistics for today.
    pub fn stats(&self) -> DashboardStats {
        self.stats_on(Utc::now().date_naive())
    }

    /// Dashboard statistics as of `date`.
    pub fn stats_on(&self, date: NaiveDate) -> DashboardStats {
        let total_rooms = self.rooms.len();
        let occupied_rooms = self
            .rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Occupied)
            .count();

        let mut checkouts_today = 0usize;
        let mut daily_revenue = Decimal::ZERO;
        let mut pending_charges = Decimal::ZERO;
        let mut stay_nights = 0i64;
        let mut current_guests = 0usize;

        for entry in self.accounts.iter() {
            let account = entry.value();
            let guest = account.guest();
            if guest.check_out == date {
                checkouts_today += 1;
            }
            for charge in account.charges() {
                if charge.timestamp.date_naive() == date {
                    daily_revenue += charge.amount;
                }
            }
            pending_charges += account.pending_total();
            if !account.checked_out() {
                stay_nights += (guest.check_out - guest.check_in).num_days();
                current_guests += 1;
            }
        }

        let average_stay = if current_guests == 0 {
            0.0
        } else {
            stay_nights as f64 / current_guests as f64
        };

        DashboardStats {
            total_rooms,
            occupied_rooms,
            checkouts_today,
            daily_revenue,
            pending_charges,
            average_stay,
        }
    }

    fn account(&self, guest_id: GuestId) -> Result<Arc<GuestAccount>, BillingError> {
        self.accounts
            .get(&guest_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(BillingError::GuestNotFound)
    }
}

impl Default for BillingEngine {
    fn default() -> Self {
        Self::new()
    }
}
