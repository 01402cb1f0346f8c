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

//! Per-guest charge ledger.
//!
//! Holds every charge posted against one guest. Marking charges paid is
//! all-or-nothing: the full selection is validated before any charge is
//! touched, so a failed settlement leaves the ledger unchanged.

use crate::base::ChargeId;
use crate::charge::{Charge, ServiceArea};
use crate::error::BillingError;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Charges for a single guest, indexed by charge ID.
///
/// Charge IDs are allocated monotonically by the engine, so iteration in
/// key order is posting order.
#[derive(Debug, Default)]
pub struct ChargeLedger {
    charges: BTreeMap<ChargeId, Charge>,
}

impl ChargeLedger {
    pub fn new() -> Self {
        Self {
            charges: BTreeMap::new(),
        }
    }

    /// Records a charge. The amount must be strictly positive.
    pub fn post(&mut self, charge: Charge) -> Result<(), BillingError> {
        if charge.amount <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount);
        }
        self.charges.insert(charge.id, charge);
        Ok(())
    }

    pub fn get(&self, id: ChargeId) -> Option<&Charge> {
        self.charges.get(&id)
    }

    /// All charges in posting order. Lazy and restartable; no state is kept
    /// between calls.
    pub fn charges(&self) -> impl Iterator<Item = &Charge> {
        self.charges.values()
    }

    /// Pending (unpaid) charges in posting order.
    pub fn pending(&self) -> impl Iterator<Item = &Charge> {
        self.charges.values().filter(|c| !c.paid)
    }

    /// Charges grouped by service area, each group in posting order.
    pub fn grouped_by_area(&self) -> HashMap<ServiceArea, Vec<&Charge>> {
        let mut groups: HashMap<ServiceArea, Vec<&Charge>> = HashMap::new();
        for charge in self.charges.values() {
            groups.entry(charge.area).or_default().push(charge);
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.charges.values().map(|c| c.amount).sum()
    }

    pub fn pending_total(&self) -> Decimal {
        self.pending().map(|c| c.amount).sum()
    }

    /// Validates a selection and returns its total without mutating anything.
    ///
    /// Duplicate IDs in the selection are counted once.
    ///
    /// # Errors
    ///
    /// - [`BillingError::EmptySelection`] - The selection is empty.
    /// - [`BillingError::ChargeNotFound`] - An ID is unknown to this ledger.
    /// - [`BillingError::AlreadyPaid`] - Every selected charge is already
    ///   paid (an idempotent resubmission of a settled set).
    /// - [`BillingError::StaleCharge`] - Part of the selection was paid since
    ///   it was made (a concurrent settlement won).
    pub fn selection_total(&self, selection: &[ChargeId]) -> Result<Decimal, BillingError> {
        let unique: BTreeSet<ChargeId> = selection.iter().copied().collect();
        if unique.is_empty() {
            return Err(BillingError::EmptySelection);
        }

        let mut total = Decimal::ZERO;
        let mut paid_count = 0usize;
        for id in &unique {
            let charge = self.charges.get(id).ok_or(BillingError::ChargeNotFound)?;
            if charge.paid {
                paid_count += 1;
            } else {
                total += charge.amount;
            }
        }

        if paid_count == unique.len() {
            return Err(BillingError::AlreadyPaid);
        }
        if paid_count > 0 {
            return Err(BillingError::StaleCharge);
        }
        Ok(total)
    }

    /// Transitions every selected charge to paid, atomically.
    ///
    /// The whole selection is validated first; either all requested charges
    /// transition or none do. Returns the settled total.
    pub fn mark_paid(&mut self, selection: &[ChargeId]) -> Result<Decimal, BillingError> {
        let total = self.selection_total(selection)?;

        // Validation passed: every id exists and is unpaid.
        for id in selection {
            if let Some(charge) = self.charges.get_mut(id) {
                charge.paid = true;
            }
        }
        self.assert_invariants();
        Ok(total)
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.charges.values().all(|c| c.amount > Decimal::ZERO),
            "Invariant violated: ledger contains a non-positive charge"
        );
    }
}
