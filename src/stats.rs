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

//! Dashboard statistics.
//!
//! Aggregated from live engine state rather than hardcoded; the dashboard
//! is a pure display consumer of the numbers the billing workflow produces.

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_rooms: usize,
    pub occupied_rooms: usize,
    pub checkouts_today: usize,
    /// Sum of charges posted today, paid or not.
    pub daily_revenue: Decimal,
    /// Sum of unpaid charge amounts across all guests.
    pub pending_charges: Decimal,
    /// Mean stay length in nights across current (non-checked-out) guests.
    pub average_stay: f64,
}
