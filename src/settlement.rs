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

//! Settlement records and the settlement workflow.
//!
//! A settlement applies payment against one or more pending charges. The
//! workflow is an explicit state machine, decoupled from any presentation
//! layer:
//!
//! ```text
//! Idle ──select──► ChargesSelected ──submit──► Validating ──► Committed
//!                        ▲                         │
//!                        └───────rejection─────────┘
//! ```
//!
//! Rejections (`InsufficientCredit`, `StaleCharge`, ...) perform no mutation
//! and return the workflow to `ChargesSelected` for re-selection. `Committed`
//! is terminal and carries the resulting [`Settlement`] record.

use crate::base::{ChargeId, GuestId, SettlementId};
use crate::engine::BillingEngine;
use crate::error::BillingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Caller-supplied key making settlement submission idempotent.
///
/// Replaying a completed key returns the recorded settlement instead of
/// debiting twice; a key whose previous attempt failed at the gateway may be
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a settlement is paid.
///
/// Only the credit-account path has real debiting logic; the card path is a
/// call to an external [`PaymentGateway`] collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditAccount,
    Card { brand: String, last4: String },
}

/// Settlement lifecycle. Created on attempt, terminal on `Completed` or
/// `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SettlementStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Record of one settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub guest_id: GuestId,
    pub charge_ids: Vec<ChargeId>,
    pub total: Decimal,
    pub status: SettlementStatus,
    pub method: PaymentMethod,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
    pub idempotency_key: IdempotencyKey,
}

/// Card charge request handed to a gateway.
#[derive(Debug)]
pub struct GatewayCharge<'a> {
    pub guest_id: GuestId,
    pub amount: Decimal,
    pub method: &'a PaymentMethod,
    pub idempotency_key: &'a IdempotencyKey,
    /// Upper bound on how long the gateway may block. Implementations must
    /// give up and return [`BillingError::GatewayTimeout`] once it elapses;
    /// the engine treats a timed-out call as unconfirmed and mutates nothing.
    pub timeout: Duration,
}

/// Confirmation returned by a gateway for a successful card charge.
#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub reference: String,
}

/// External payment collaborator for the card path.
///
/// This is the only call in the settlement workflow that blocks on external
/// I/O, and it is always invoked with a bounded timeout.
pub trait PaymentGateway: Send + Sync {
    /// # Errors
    ///
    /// - [`BillingError::GatewayTimeout`] - No answer within `timeout`.
    /// - [`BillingError::GatewayDeclined`] - The charge was refused.
    fn charge(&self, request: &GatewayCharge<'_>) -> Result<GatewayReceipt, BillingError>;
}

/// Gateway that approves every charge. Used by the demo server and tests.
#[derive(Debug, Default)]
pub struct AutoApproveGateway;

impl PaymentGateway for AutoApproveGateway {
    fn charge(&self, request: &GatewayCharge<'_>) -> Result<GatewayReceipt, BillingError> {
        Ok(GatewayReceipt {
            reference: format!("AUTO-{}", request.idempotency_key),
        })
    }
}

/// Workflow states. `Committed` is terminal; a rejection returns the
/// workflow to `ChargesSelected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    ChargesSelected,
    Validating,
    Committed,
}

/// Explicit settlement state machine for one guest, driven by discrete
/// transition calls.
#[derive(Debug)]
pub struct SettlementWorkflow {
    guest_id: GuestId,
    selection: Vec<ChargeId>,
    state: WorkflowState,
    rejection: Option<BillingError>,
    settlement: Option<Settlement>,
}

impl SettlementWorkflow {
    pub fn new(guest_id: GuestId) -> Self {
        Self {
            guest_id,
            selection: Vec::new(),
            state: WorkflowState::Idle,
            rejection: None,
            settlement: None,
        }
    }

    pub fn guest_id(&self) -> GuestId {
        self.guest_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn selection(&self) -> &[ChargeId] {
        &self.selection
    }

    /// The error that caused the most recent rejection, if any.
    pub fn last_rejection(&self) -> Option<&BillingError> {
        self.rejection.as_ref()
    }

    /// The committed settlement record, once the workflow has committed.
    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    /// `Idle/ChargesSelected -> ChargesSelected` with a nonempty selection.
    ///
    /// # Errors
    ///
    /// - [`BillingError::EmptySelection`] - The selection is empty.
    /// - [`BillingError::AlreadyPaid`] - The workflow already committed.
    pub fn select(&mut self, charge_ids: Vec<ChargeId>) -> Result<(), BillingError> {
        if self.state == WorkflowState::Committed {
            return Err(BillingError::AlreadyPaid);
        }
        if charge_ids.is_empty() {
            return Err(BillingError::EmptySelection);
        }
        self.selection = charge_ids;
        self.rejection = None;
        self.state = WorkflowState::ChargesSelected;
        Ok(())
    }

    /// `ChargesSelected -> Validating -> {Committed | back to ChargesSelected}`.
    ///
    /// Validation and commit happen atomically inside the engine under the
    /// guest's lock; on rejection nothing was mutated and the selection is
    /// kept so the caller can re-select and resubmit.
    pub fn submit(
        &mut self,
        engine: &BillingEngine,
        method: PaymentMethod,
        idempotency_key: IdempotencyKey,
        gateway: &dyn PaymentGateway,
    ) -> Result<&Settlement, BillingError> {
        match self.state {
            WorkflowState::Idle => return Err(BillingError::EmptySelection),
            WorkflowState::Committed => return Err(BillingError::AlreadyPaid),
            WorkflowState::ChargesSelected | WorkflowState::Validating => {}
        }

        self.state = WorkflowState::Validating;
        match engine.settle(self.guest_id, &self.selection, method, idempotency_key, gateway) {
            Ok(settlement) => {
                self.state = WorkflowState::Committed;
                let recorded: &Settlement = self.settlement.insert(settlement);
                Ok(recorded)
            }
            Err(err) => {
                // No mutation occurred; return to ChargesSelected for
                // re-selection.
                self.state = WorkflowState::ChargesSelected;
                self.rejection = Some(err.clone());
                Err(err)
            }
        }
    }
}
