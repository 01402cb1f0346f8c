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

//! Guest credit accounts.
//!
//! A credit account tracks a guest's prepaid/authorized spending limit for
//! on-property charges. `available` is derived, never stored, so the
//! identity `available == initial - used` holds by construction.

use crate::error::BillingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Prepaid credit for one guest.
#[derive(Debug, Clone)]
pub struct CreditAccount {
    initial: Decimal,
    used: Decimal,
    last_updated: DateTime<Utc>,
}

impl CreditAccount {
    /// Opens an account with the given limit. A zero limit is valid (the
    /// guest simply cannot settle against credit).
    pub fn new(initial: Decimal) -> Result<Self, BillingError> {
        if initial < Decimal::ZERO {
            return Err(BillingError::InvalidAmount);
        }
        Ok(Self {
            initial,
            used: Decimal::ZERO,
            last_updated: Utc::now(),
        })
    }

    pub fn initial(&self) -> Decimal {
        self.initial
    }

    pub fn used(&self) -> Decimal {
        self.used
    }

    /// `initial - used`, always.
    pub fn available(&self) -> Decimal {
        self.initial - self.used
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Debits `amount` from the available credit in one step.
    ///
    /// Rejected without any change if `amount > available`; available credit
    /// can never go negative. Atomicity against concurrent settlements for
    /// the same guest comes from the per-guest lock held by the caller.
    pub fn reserve_and_debit(&mut self, amount: Decimal) -> Result<(), BillingError> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount);
        }
        if amount > self.available() {
            return Err(BillingError::InsufficientCredit);
        }
        self.used += amount;
        self.last_updated = Utc::now();
        self.assert_invariants();
        Ok(())
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.available() >= Decimal::ZERO,
            "Invariant violated: available credit went negative: {}",
            self.available()
        );
        debug_assert!(
            self.used >= Decimal::ZERO,
            "Invariant violated: used credit went negative: {}",
            self.used
        );
    }

    /// Snapshot for reporting.
    pub fn balance(&self) -> CreditBalance {
        CreditBalance {
            initial: self.initial,
            used: self.used,
            available: self.available(),
            last_updated: self.last_updated,
        }
    }
}

/// Point-in-time view of a credit account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditBalance {
    pub initial: Decimal,
    pub used: Decimal,
    pub available: Decimal,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn available_is_derived() {
        let mut credit = CreditAccount::new(dec!(1000.00)).unwrap();
        credit.reserve_and_debit(dec!(530.00)).unwrap();
        assert_eq!(credit.available(), dec!(470.00));
        assert_eq!(credit.initial() - credit.used(), credit.available());
    }

    #[test]
    fn debit_exceeding_available_is_rejected_untouched() {
        let mut credit = CreditAccount::new(dec!(1000.00)).unwrap();
        credit.reserve_and_debit(dec!(530.00)).unwrap();

        let result = credit.reserve_and_debit(dec!(600.00));
        assert_eq!(result, Err(BillingError::InsufficientCredit));
        assert_eq!(credit.used(), dec!(530.00));
        assert_eq!(credit.available(), dec!(470.00));
    }

    #[test]
    fn debit_of_exact_available_succeeds() {
        let mut credit = CreditAccount::new(dec!(250.00)).unwrap();
        credit.reserve_and_debit(dec!(250.00)).unwrap();
        assert_eq!(credit.available(), Decimal::ZERO);
    }

    #[test]
    fn non_positive_debit_is_rejected() {
        let mut credit = CreditAccount::new(dec!(100.00)).unwrap();
        assert_eq!(
            credit.reserve_and_debit(Decimal::ZERO),
            Err(BillingError::InvalidAmount)
        );
        assert_eq!(
            credit.reserve_and_debit(dec!(-5.00)),
            Err(BillingError::InvalidAmount)
        );
    }

    #[test]
    fn negative_initial_limit_is_rejected() {
        assert_eq!(
            CreditAccount::new(dec!(-1.00)).unwrap_err(),
            BillingError::InvalidAmount
        );
    }

    #[test]
    fn debit_bumps_last_updated() {
        let mut credit = CreditAccount::new(dec!(100.00)).unwrap();
        let before = credit.last_updated();
        credit.reserve_and_debit(dec!(10.00)).unwrap();
        assert!(credit.last_updated() >= before);
    }
}
