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

//! Error types for the billing engine.
//!
//! All errors are recovered at the settlement-workflow boundary and surfaced
//! to the caller as a rejection with a machine-readable kind plus human
//! message; none are fatal to the process.

use thiserror::Error;

/// Billing and settlement errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Settlement submitted with no charges selected
    #[error("no charges selected")]
    EmptySelection,

    /// Referenced guest does not exist
    #[error("guest not found")]
    GuestNotFound,

    /// Bracelet code maps to no active stay
    #[error("bracelet code not recognized")]
    BraceletNotFound,

    /// Referenced room does not exist
    #[error("room not found")]
    RoomNotFound,

    /// Referenced charge ID does not exist
    #[error("charge not found")]
    ChargeNotFound,

    /// Charge belongs to a different guest
    #[error("charge does not belong to this guest")]
    GuestMismatch,

    /// Every selected charge has already been settled
    #[error("charges already paid")]
    AlreadyPaid,

    /// Selection changed since it was made (a charge was settled concurrently)
    #[error("selected charges are stale, re-select and retry")]
    StaleCharge,

    /// Settlement total exceeds the guest's available credit
    #[error("insufficient available credit")]
    InsufficientCredit,

    /// Another settlement with the same idempotency key is in flight
    #[error("settlement already in progress for this idempotency key")]
    DuplicateSettlement,

    /// Guest ID is already checked in
    #[error("guest is already checked in")]
    DuplicateGuest,

    /// Bracelet code is already bound to another active stay
    #[error("bracelet code is already in use")]
    BraceletInUse,

    /// The stay has ended; no new charges may be posted
    #[error("guest has checked out")]
    CheckedOut,

    /// Payment gateway did not answer within the configured timeout.
    /// Retryable by the caller with the same idempotency key.
    #[error("payment gateway timed out")]
    GatewayTimeout,

    /// Payment gateway refused the card charge
    #[error("payment gateway declined the charge")]
    GatewayDeclined,
}

impl BillingError {
    /// Stable machine-readable kind, used by the REST surface and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::EmptySelection => "EMPTY_SELECTION",
            Self::GuestNotFound => "GUEST_NOT_FOUND",
            Self::BraceletNotFound => "BRACELET_NOT_FOUND",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::ChargeNotFound => "CHARGE_NOT_FOUND",
            Self::GuestMismatch => "GUEST_MISMATCH",
            Self::AlreadyPaid => "ALREADY_PAID",
            Self::StaleCharge => "STALE_CHARGE",
            Self::InsufficientCredit => "INSUFFICIENT_CREDIT",
            Self::DuplicateSettlement => "DUPLICATE_SETTLEMENT",
            Self::DuplicateGuest => "DUPLICATE_GUEST",
            Self::BraceletInUse => "BRACELET_IN_USE",
            Self::CheckedOut => "CHECKED_OUT",
            Self::GatewayTimeout => "GATEWAY_TIMEOUT",
            Self::GatewayDeclined => "GATEWAY_DECLINED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BillingError;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            BillingError::InvalidAmount.to_string(),
            "invalid amount (must be positive)"
        );
        assert_eq!(BillingError::EmptySelection.to_string(), "no charges selected");
        assert_eq!(BillingError::GuestNotFound.to_string(), "guest not found");
        assert_eq!(
            BillingError::BraceletNotFound.to_string(),
            "bracelet code not recognized"
        );
        assert_eq!(BillingError::ChargeNotFound.to_string(), "charge not found");
        assert_eq!(BillingError::AlreadyPaid.to_string(), "charges already paid");
        assert_eq!(
            BillingError::StaleCharge.to_string(),
            "selected charges are stale, re-select and retry"
        );
        assert_eq!(
            BillingError::InsufficientCredit.to_string(),
            "insufficient available credit"
        );
        assert_eq!(BillingError::CheckedOut.to_string(), "guest has checked out");
        assert_eq!(BillingError::GatewayTimeout.to_string(), "payment gateway timed out");
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(BillingError::InsufficientCredit.kind(), "INSUFFICIENT_CREDIT");
        assert_eq!(BillingError::StaleCharge.kind(), "STALE_CHARGE");
        assert_eq!(BillingError::GatewayTimeout.kind(), "GATEWAY_TIMEOUT");
    }

    #[test]
    fn errors_are_cloneable() {
        let error = BillingError::InsufficientCredit;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
