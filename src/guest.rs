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

//! Guest profiles and per-guest accounts.
//!
//! A [`GuestAccount`] is the single logical owner of one guest's charge
//! ledger and credit account. Every mutation goes through one mutex, which
//! is what makes `reserve_and_debit` and `mark_paid` atomic against
//! concurrent scans and settlements for the same bracelet. Operations on
//! different guests never share a lock.

use crate::base::{BraceletCode, ChargeId, GuestId, RoomId};
use crate::charge::Charge;
use crate::credit::{CreditAccount, CreditBalance};
use crate::error::BillingError;
use crate::ledger::ChargeLedger;
use crate::settlement::{GatewayCharge, PaymentGateway, PaymentMethod, Settlement};
use crate::settlement::IdempotencyKey;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::time::Duration;

/// Guest identity and stay window.
///
/// Profile metadata (VIP flag, rating, visit counters) is display-only and
/// carries no invariant here.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub bracelet_code: BraceletCode,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Back-reference for display only; not a lifecycle dependency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub is_vip: bool,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub total_visits: u32,
}

/// Guest plus derived charge totals, for directory listings.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct GuestSummary {
    #[serde(flatten)]
    pub guest: Guest,
    pub total_charges: Decimal,
    pub pending_charges: Decimal,
}

/// Result of applying a settlement to an account.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub total: Decimal,
    pub gateway_reference: Option<String>,
}

#[derive(Debug)]
struct GuestAccountData {
    guest: Guest,
    ledger: ChargeLedger,
    credit: CreditAccount,
    checked_out: bool,
    settlements: Vec<Settlement>,
}

/// One guest's billing state behind a single mutex.
#[derive(Debug)]
pub struct GuestAccount {
    inner: Mutex<GuestAccountData>,
}

impl GuestAccount {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(guest: Guest, initial_credit: Decimal) -> Result<Self, BillingError> {
        Ok(Self {
            inner: Mutex::new(GuestAccountData {
                guest,
                ledger: ChargeLedger::new(),
                credit: CreditAccount::new(initial_credit)?,
                checked_out: false,
                settlements: Vec::new(),
            }),
        })
    }

    /// Snapshot of the guest profile.
    pub fn guest(&self) -> Guest {
        self.inner.lock().guest.clone()
    }

    /// Guest profile plus derived totals.
    pub fn summary(&self) -> GuestSummary {
        let data = self.inner.lock();
        GuestSummary {
            guest: data.guest.clone(),
            total_charges: data.ledger.total(),
            pending_charges: data.ledger.pending_total(),
        }
    }

    pub fn checked_out(&self) -> bool {
        self.inner.lock().checked_out
    }

    pub fn credit_balance(&self) -> CreditBalance {
        self.inner.lock().credit.balance()
    }

    pub fn pending_total(&self) -> Decimal {
        self.inner.lock().ledger.pending_total()
    }

    /// Snapshot of all charges in posting order.
    pub fn charges(&self) -> Vec<Charge> {
        self.inner.lock().ledger.charges().cloned().collect()
    }

    /// Snapshot of pending charge IDs in posting order.
    pub fn pending_charge_ids(&self) -> Vec<ChargeId> {
        self.inner.lock().ledger.pending().map(|c| c.id).collect()
    }

    /// Settlement history, oldest first.
    pub fn settlements(&self) -> Vec<Settlement> {
        self.inner.lock().settlements.clone()
    }

    /// Validates a selection against the live ledger without mutating it.
    pub fn selection_total(&self, selection: &[ChargeId]) -> Result<Decimal, BillingError> {
        self.inner.lock().ledger.selection_total(selection)
    }

    /// Records a charge against the stay.
    ///
    /// # Errors
    ///
    /// - [`BillingError::GuestMismatch`] - Charge is keyed to another guest.
    /// - [`BillingError::CheckedOut`] - The stay has ended; no new charges.
    /// - [`BillingError::InvalidAmount`] - Amount is zero or negative.
    pub fn post_charge(&self, charge: Charge) -> Result<(), BillingError> {
        let mut data = self.inner.lock();
        if charge.guest_id != data.guest.id {
            return Err(BillingError::GuestMismatch);
        }
        if data.checked_out {
            return Err(BillingError::CheckedOut);
        }
        data.ledger.post(charge)
    }

    /// Validates and commits one settlement as a single logical unit.
    ///
    /// Everything happens under the account lock: the selection is
    /// re-validated against the live ledger (guarding against a concurrent
    /// settlement having already paid part of it), the credit account is
    /// debited or the gateway confirms the card charge, and only then are
    /// the charges marked paid. Any failure along the way leaves ledger and
    /// credit exactly as they were.
    pub fn settle(
        &self,
        selection: &[ChargeId],
        method: &PaymentMethod,
        idempotency_key: &IdempotencyKey,
        gateway: &dyn PaymentGateway,
        gateway_timeout: Duration,
    ) -> Result<SettlementOutcome, BillingError> {
        let mut data = self.inner.lock();

        let total = data.ledger.selection_total(selection)?;

        let gateway_reference = match method {
            PaymentMethod::CreditAccount => {
                data.credit.reserve_and_debit(total)?;
                None
            }
            PaymentMethod::Card { .. } => {
                // No debit and no mark-paid without gateway confirmation.
                let receipt = gateway.charge(&GatewayCharge {
                    guest_id: data.guest.id,
                    amount: total,
                    method,
                    idempotency_key,
                    timeout: gateway_timeout,
                })?;
                Some(receipt.reference)
            }
        };

        // Pre-validated above and still under the same lock, so this cannot
        // fail; `?` keeps the error path honest regardless.
        let settled = data.ledger.mark_paid(selection)?;
        debug_assert_eq!(settled, total);

        Ok(SettlementOutcome {
            total,
            gateway_reference,
        })
    }

    /// Appends a terminal settlement record to the guest's history.
    pub fn record_settlement(&self, settlement: Settlement) {
        self.inner.lock().settlements.push(settlement);
    }

    /// Ends the stay: the bracelet code is invalidated by the engine and no
    /// further charges may be posted. Settlement of remaining pending
    /// charges stays permitted so the folio can still be closed.
    pub fn check_out(&self) -> Result<(), BillingError> {
        let mut data = self.inner.lock();
        if data.checked_out {
            return Err(BillingError::CheckedOut);
        }
        data.checked_out = true;
        Ok(())
    }
}

impl Serialize for GuestAccount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("GuestAccount", 7)?;
        state.serialize_field("guest", &data.guest.id)?;
        state.serialize_field("name", &data.guest.name)?;
        state.serialize_field(
            "initial",
            &data.credit.initial().round_dp(GuestAccount::DECIMAL_PRECISION),
        )?;
        state.serialize_field(
            "used",
            &data.credit.used().round_dp(GuestAccount::DECIMAL_PRECISION),
        )?;
        state.serialize_field(
            "available",
            &data.credit.available().round_dp(GuestAccount::DECIMAL_PRECISION),
        )?;
        state.serialize_field(
            "pending_charges",
            &data.ledger.pending_total().round_dp(GuestAccount::DECIMAL_PRECISION),
        )?;
        state.serialize_field("checked_out", &data.checked_out)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charge::{ChargeSource, ServiceArea};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn make_guest(id: u32) -> Guest {
        Guest {
            id: GuestId(id),
            name: format!("Guest {id}"),
            email: None,
            phone: None,
            bracelet_code: BraceletCode::new(format!("BR{id:03}")),
            check_in: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2024, 1, 18).unwrap(),
            room_id: None,
            is_vip: false,
            rating: 3,
            total_visits: 1,
        }
    }

    fn make_charge(id: u64, guest_id: u32, amount: Decimal) -> Charge {
        Charge {
            id: ChargeId(id),
            guest_id: GuestId(guest_id),
            description: format!("charge {id}"),
            amount,
            timestamp: Utc::now(),
            area: ServiceArea::Bar,
            source: ChargeSource::Pos,
            paid: false,
            items: Vec::new(),
        }
    }

    #[test]
    fn charge_for_wrong_guest_is_rejected() {
        let account = GuestAccount::new(make_guest(1), dec!(100.00)).unwrap();
        let result = account.post_charge(make_charge(1, 2, dec!(10.00)));
        assert_eq!(result, Err(BillingError::GuestMismatch));
        assert!(account.charges().is_empty());
    }

    #[test]
    fn checked_out_account_rejects_new_charges() {
        let account = GuestAccount::new(make_guest(1), dec!(100.00)).unwrap();
        account.check_out().unwrap();

        let result = account.post_charge(make_charge(1, 1, dec!(10.00)));
        assert_eq!(result, Err(BillingError::CheckedOut));
    }

    #[test]
    fn double_check_out_is_rejected() {
        let account = GuestAccount::new(make_guest(1), dec!(100.00)).unwrap();
        account.check_out().unwrap();
        assert_eq!(account.check_out(), Err(BillingError::CheckedOut));
    }

    #[test]
    fn summary_reports_derived_totals() {
        let account = GuestAccount::new(make_guest(1), dec!(500.00)).unwrap();
        account.post_charge(make_charge(1, 1, dec!(120.00))).unwrap();
        account.post_charge(make_charge(2, 1, dec!(85.00))).unwrap();

        let summary = account.summary();
        assert_eq!(summary.total_charges, dec!(205.00));
        assert_eq!(summary.pending_charges, dec!(205.00));
    }

    #[test]
    fn serializer_rounds_to_two_decimal_places() {
        let account = GuestAccount::new(make_guest(1), dec!(100.005)).unwrap();
        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        // Decimal uses banker's rounding: 100.005 -> 100.00
        assert_eq!(parsed["initial"].as_str().unwrap(), "100.00");
        assert_eq!(parsed["used"].as_str().unwrap(), "0");
        assert_eq!(parsed["checked_out"], false);
    }
}
