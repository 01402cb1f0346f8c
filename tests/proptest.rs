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

//! Property-based tests for the billing engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! charges and settlements.

use chrono::NaiveDate;
use guest_ledger_rs::{
    AutoApproveGateway, BillingEngine, BillingError, BraceletCode, ChargeId, CreditAccount, Guest,
    GuestId, IdempotencyKey, NewCharge, PaymentMethod, ServiceArea,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.01 to 1000.00 with 2 decimal places).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn make_guest(id: u32) -> Guest {
    Guest {
        id: GuestId(id),
        name: format!("Guest {id}"),
        email: None,
        phone: None,
        bracelet_code: BraceletCode::new(format!("BR{id:05}")),
        check_in: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        check_out: NaiveDate::from_ymd_opt(2024, 1, 18).unwrap(),
        room_id: None,
        is_vip: false,
        rating: 3,
        total_visits: 1,
    }
}

// =============================================================================
// Credit Account Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Available credit always equals initial minus used.
    #[test]
    fn available_equals_initial_minus_used(
        initial in arb_amount(),
        debits in prop::collection::vec(arb_amount(), 0..10),
    ) {
        let mut credit = CreditAccount::new(initial).unwrap();

        // Debits may be rejected for insufficient credit, that's ok.
        for amount in &debits {
            let _ = credit.reserve_and_debit(*amount);
        }

        prop_assert_eq!(credit.available(), credit.initial() - credit.used());
        prop_assert_eq!(credit.initial(), initial);
    }

    /// Available credit never goes negative, whatever the debit sequence.
    #[test]
    fn available_never_negative(
        initial in arb_amount(),
        debits in prop::collection::vec(arb_amount(), 1..20),
    ) {
        let mut credit = CreditAccount::new(initial).unwrap();

        for amount in &debits {
            let _ = credit.reserve_and_debit(*amount);
            prop_assert!(credit.available() >= Decimal::ZERO);
        }
    }

    /// A rejected debit leaves the account exactly as it was.
    #[test]
    fn rejected_debit_changes_nothing(
        initial in arb_amount(),
        extra in arb_amount(),
    ) {
        let mut credit = CreditAccount::new(initial).unwrap();

        let result = credit.reserve_and_debit(initial + extra);
        prop_assert_eq!(result, Err(BillingError::InsufficientCredit));
        prop_assert_eq!(credit.used(), Decimal::ZERO);
        prop_assert_eq!(credit.available(), initial);
    }

    /// Accepted debits sum to used.
    #[test]
    fn accepted_debits_sum_to_used(
        initial in (100_000i64..=1_000_000i64).prop_map(|c| Decimal::new(c, 2)),
        debits in prop::collection::vec(arb_amount(), 1..10),
    ) {
        let mut credit = CreditAccount::new(initial).unwrap();
        let mut accepted = Decimal::ZERO;

        for amount in &debits {
            if credit.reserve_and_debit(*amount).is_ok() {
                accepted += *amount;
            }
        }

        prop_assert_eq!(credit.used(), accepted);
    }
}

// =============================================================================
// Settlement Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A settlement is all-or-nothing: after any single settlement attempt,
    /// either every selected charge is paid and credit was debited by the
    /// selection total, or no charge is paid and credit is untouched.
    #[test]
    fn settlement_is_atomic(
        initial in arb_amount(),
        amounts in prop::collection::vec(arb_amount(), 1..8),
    ) {
        let engine = BillingEngine::new();
        engine.check_in(make_guest(1), initial).unwrap();

        let mut selection = Vec::new();
        let mut total = Decimal::ZERO;
        for amount in &amounts {
            let charge = engine
                .add_charge(GuestId(1), NewCharge::new("c", *amount, ServiceArea::Bar))
                .unwrap();
            selection.push(charge.id);
            total += *amount;
        }

        let result = engine.settle(
            GuestId(1),
            &selection,
            PaymentMethod::CreditAccount,
            IdempotencyKey::new("atomic"),
            &AutoApproveGateway,
        );

        let credit = engine.credit(GuestId(1)).unwrap();
        let charges = engine.charges(GuestId(1)).unwrap();
        if result.is_ok() {
            prop_assert!(total <= initial);
            prop_assert_eq!(credit.used, total);
            prop_assert!(charges.iter().all(|c| c.paid));
        } else {
            prop_assert!(total > initial);
            prop_assert_eq!(credit.used, Decimal::ZERO);
            prop_assert!(charges.iter().all(|c| !c.paid));
        }
        prop_assert_eq!(credit.available, credit.initial - credit.used);
    }

    /// Used credit always equals the sum of completed credit-account
    /// settlements, whatever subset of charges each settlement picked.
    #[test]
    fn used_credit_equals_settled_totals(
        initial in (100_000i64..=1_000_000i64).prop_map(|c| Decimal::new(c, 2)),
        amounts in prop::collection::vec(arb_amount(), 2..10),
        chunk in 1usize..4,
    ) {
        let engine = BillingEngine::new();
        engine.check_in(make_guest(1), initial).unwrap();

        let ids: Vec<ChargeId> = amounts
            .iter()
            .map(|amount| {
                engine
                    .add_charge(GuestId(1), NewCharge::new("c", *amount, ServiceArea::Spa))
                    .unwrap()
                    .id
            })
            .collect();

        let mut settled = Decimal::ZERO;
        for (i, selection) in ids.chunks(chunk).enumerate() {
            if let Ok(settlement) = engine.settle(
                GuestId(1),
                selection,
                PaymentMethod::CreditAccount,
                IdempotencyKey::new(format!("chunk-{i}")),
                &AutoApproveGateway,
            ) {
                settled += settlement.total;
            }
        }

        prop_assert_eq!(engine.credit(GuestId(1)).unwrap().used, settled);
    }

    /// Replaying a completed idempotency key never debits twice.
    #[test]
    fn idempotent_replay_debits_once(
        initial in (100_000i64..=1_000_000i64).prop_map(|c| Decimal::new(c, 2)),
        amount in arb_amount(),
        replays in 1usize..5,
    ) {
        let engine = BillingEngine::new();
        engine.check_in(make_guest(1), initial).unwrap();
        let charge = engine
            .add_charge(GuestId(1), NewCharge::new("c", amount, ServiceArea::Bar))
            .unwrap();

        let key = IdempotencyKey::new("replay");
        let first = engine
            .settle(
                GuestId(1),
                &[charge.id],
                PaymentMethod::CreditAccount,
                key.clone(),
                &AutoApproveGateway,
            )
            .unwrap();

        for _ in 0..replays {
            let again = engine
                .settle(
                    GuestId(1),
                    &[charge.id],
                    PaymentMethod::CreditAccount,
                    key.clone(),
                    &AutoApproveGateway,
                )
                .unwrap();
            prop_assert_eq!(&again, &first);
        }

        prop_assert_eq!(engine.credit(GuestId(1)).unwrap().used, amount);
    }

    /// Paid charges never return to pending.
    #[test]
    fn paid_charges_stay_paid(
        initial in (100_000i64..=1_000_000i64).prop_map(|c| Decimal::new(c, 2)),
        amounts in prop::collection::vec(arb_amount(), 1..6),
    ) {
        let engine = BillingEngine::new();
        engine.check_in(make_guest(1), initial).unwrap();

        let ids: Vec<ChargeId> = amounts
            .iter()
            .map(|amount| {
                engine
                    .add_charge(GuestId(1), NewCharge::new("c", *amount, ServiceArea::Bar))
                    .unwrap()
                    .id
            })
            .collect();

        engine
            .settle(
                GuestId(1),
                &ids,
                PaymentMethod::CreditAccount,
                IdempotencyKey::new("all"),
                &AutoApproveGateway,
            )
            .unwrap();

        // Resubmissions under any key are rejected and flip nothing back.
        let _ = engine.settle(
            GuestId(1),
            &ids,
            PaymentMethod::CreditAccount,
            IdempotencyKey::new("again"),
            &AutoApproveGateway,
        );

        prop_assert!(engine.charges(GuestId(1)).unwrap().iter().all(|c| c.paid));
    }
}

// =============================================================================
// Engine Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Different guests are isolated.
    #[test]
    fn guests_are_isolated(
        initial1 in arb_amount(),
        initial2 in arb_amount(),
    ) {
        let engine = BillingEngine::new();
        engine.check_in(make_guest(1), initial1).unwrap();
        engine.check_in(make_guest(2), initial2).unwrap();

        let credit1 = engine.credit(GuestId(1)).unwrap();
        let credit2 = engine.credit(GuestId(2)).unwrap();
        prop_assert_eq!(credit1.initial, initial1);
        prop_assert_eq!(credit2.initial, initial2);
    }

    /// The engine handles many charges without losing any.
    #[test]
    fn engine_handles_many_charges(
        charge_count in 10usize..100,
    ) {
        let engine = BillingEngine::new();
        engine.check_in(make_guest(1), Decimal::new(1, 2)).unwrap();

        for i in 0..charge_count {
            let amount = Decimal::new((i as i64 + 1) * 100, 2);
            engine
                .add_charge(GuestId(1), NewCharge::new("c", amount, ServiceArea::Other))
                .unwrap();
        }

        let expected: Decimal = (1..=charge_count as i64)
            .map(|i| Decimal::new(i * 100, 2))
            .sum();
        prop_assert_eq!(engine.guest(GuestId(1)).unwrap().pending_charges, expected);
        prop_assert_eq!(engine.charges(GuestId(1)).unwrap().len(), charge_count);
    }
}
