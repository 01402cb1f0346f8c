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

//! Charge records.
//!
//! A charge is a billable event tied to a guest and a service area. Charges
//! start out pending and transition to paid exactly once; a paid charge is
//! immutable and there is no un-pay operation.

use crate::base::{ChargeId, GuestId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Service area a charge originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceArea {
    Restaurant,
    Bar,
    Spa,
    RoomService,
    Laundry,
    Minibar,
    Other,
}

impl ServiceArea {
    /// Parses the wire/CSV spelling of an area. Unknown spellings map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "restaurant" => Self::Restaurant,
            "bar" => Self::Bar,
            "spa" => Self::Spa,
            "roomservice" | "room_service" | "room-service" => Self::RoomService,
            "laundry" => Self::Laundry,
            "minibar" => Self::Minibar,
            _ => Self::Other,
        }
    }
}

/// Where the charge was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeSource {
    Pos,
    Manual,
}

/// One itemized line on a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A billable event tied to a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub guest_id: GuestId,
    pub description: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub area: ServiceArea,
    pub source: ChargeSource,
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<LineItem>,
}

/// Charge as submitted by a point of sale, before the engine assigns an ID.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCharge {
    pub description: String,
    pub amount: Decimal,
    pub area: ServiceArea,
    pub source: ChargeSource,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl NewCharge {
    pub fn new(description: impl Into<String>, amount: Decimal, area: ServiceArea) -> Self {
        Self {
            description: description.into(),
            amount,
            area,
            source: ChargeSource::Pos,
            items: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: ChargeSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }
}
