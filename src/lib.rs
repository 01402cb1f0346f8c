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

//! # Guest Ledger
//!
//! This library provides a guest billing engine for on-property charges:
//! bracelet scan → charge listing → credit check → payment settlement.
//!
//! ## Core Components
//!
//! - [`BillingEngine`]: Central processor managing guest accounts, rooms,
//!   and the settlement log
//! - [`GuestAccount`]: One guest's charge ledger and credit account behind
//!   a single lock
//! - [`SettlementWorkflow`]: Explicit state machine driving charge
//!   selection, validation, and commit
//! - [`BillingError`]: Error taxonomy for billing and settlement failures
//!
//! ## Example
//!
//! ```
//! use guest_ledger_rs::{
//!     AutoApproveGateway, BillingEngine, BraceletCode, Guest, GuestId, IdempotencyKey,
//!     NewCharge, PaymentMethod, ServiceArea,
//! };
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let engine = BillingEngine::new();
//! let guest = Guest {
//!     id: GuestId(1),
//!     name: "Carlos Mendez".to_string(),
//!     email: None,
//!     phone: None,
//!     bracelet_code: BraceletCode::new("BR001"),
//!     check_in: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!     check_out: NaiveDate::from_ymd_opt(2024, 1, 18).unwrap(),
//!     room_id: None,
//!     is_vip: false,
//!     rating: 4,
//!     total_visits: 2,
//! };
//! engine.check_in(guest, dec!(1000.00)).unwrap();
//!
//! // Post a charge and settle it against the credit account.
//! let charge = engine
//!     .add_charge(GuestId(1), NewCharge::new("Dinner", dec!(120.00), ServiceArea::Restaurant))
//!     .unwrap();
//! let settlement = engine
//!     .settle(
//!         GuestId(1),
//!         &[charge.id],
//!         PaymentMethod::CreditAccount,
//!         IdempotencyKey::new("pos-1"),
//!         &AutoApproveGateway,
//!     )
//!     .unwrap();
//! assert_eq!(settlement.total, dec!(120.00));
//!
//! let credit = engine.credit(GuestId(1)).unwrap();
//! assert_eq!(credit.available, dec!(880.00));
//! ```
//!
//! ## Thread Safety
//!
//! Operations on different guests run fully in parallel; all operations
//! against one guest's ledger and credit are serialized by that guest's
//! account lock, so concurrent settlements can never overdraw credit or
//! double-settle a charge.

mod base;
pub mod charge;
pub mod credit;
mod engine;
pub mod error;
pub mod guest;
pub mod ledger;
pub mod room;
mod settlement;
mod settlement_log;
pub mod stats;

pub use base::{BraceletCode, ChargeId, GuestId, RoomId, SettlementId};
pub use charge::{Charge, ChargeSource, LineItem, NewCharge, ServiceArea};
pub use credit::{CreditAccount, CreditBalance};
pub use engine::BillingEngine;
pub use error::BillingError;
pub use guest::{Guest, GuestAccount, GuestSummary};
pub use ledger::ChargeLedger;
pub use room::{Room, RoomStatus, RoomType};
pub use settlement::{
    AutoApproveGateway, GatewayCharge, GatewayReceipt, IdempotencyKey, PaymentGateway,
    PaymentMethod, Settlement, SettlementStatus, SettlementWorkflow, WorkflowState,
};
pub use settlement_log::SettlementLog;
pub use stats::DashboardStats;
