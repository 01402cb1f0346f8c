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

use chrono::{Days, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use guest_ledger_rs::{
    AutoApproveGateway, BillingEngine, BraceletCode, Guest, GuestId, IdempotencyKey, NewCharge,
    PaymentMethod, ServiceArea,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Guest Ledger - Process billing event CSV files
///
/// Reads billing events from a CSV file and outputs guest account states
/// to stdout. Supports check-ins, charges, settlements, and checkouts.
#[derive(Parser, Debug)]
#[command(name = "guest-ledger-rs")]
#[command(about = "A billing engine that processes guest event CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with billing events
    ///
    /// Expected format: type,guest,ref,amount,area
    /// Example: cargo run -- events.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber_init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match process_events(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing events: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_accounts(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn tracing_subscriber_init() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, guest, ref, amount, area`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    event_type: String,
    guest: u32,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    area: Option<String>,
}

/// A parsed billing event.
#[derive(Debug)]
enum BillingEvent {
    /// Opens a stay: binds a bracelet code and a credit limit.
    CheckIn {
        guest_id: GuestId,
        bracelet: BraceletCode,
        credit: Decimal,
    },
    /// Posts a charge against the stay.
    Charge {
        guest_id: GuestId,
        description: String,
        amount: Decimal,
        area: ServiceArea,
    },
    /// Settles all currently pending charges.
    Settle {
        guest_id: GuestId,
        method: PaymentMethod,
    },
    /// Ends the stay and invalidates the bracelet.
    CheckOut { guest_id: GuestId },
}

impl CsvRecord {
    /// Converts a CSV record to a billing event.
    ///
    /// Returns `None` for invalid event types or missing required fields.
    fn into_event(self) -> Option<BillingEvent> {
        let guest_id = GuestId(self.guest);

        match self.event_type.to_lowercase().as_str() {
            "checkin" => {
                let bracelet = BraceletCode::new(self.reference?);
                let credit = self.amount?;
                Some(BillingEvent::CheckIn {
                    guest_id,
                    bracelet,
                    credit,
                })
            }
            "charge" => {
                let amount = self.amount?;
                let area = self
                    .area
                    .as_deref()
                    .map(ServiceArea::parse)
                    .unwrap_or(ServiceArea::Other);
                Some(BillingEvent::Charge {
                    guest_id,
                    description: self.reference.unwrap_or_else(|| "POS charge".to_string()),
                    amount,
                    area,
                })
            }
            "settle" => {
                let method = match self.reference.as_deref() {
                    Some("card") => PaymentMethod::Card {
                        brand: "card".to_string(),
                        last4: "0000".to_string(),
                    },
                    _ => PaymentMethod::CreditAccount,
                };
                Some(BillingEvent::Settle { guest_id, method })
            }
            "checkout" => Some(BillingEvent::CheckOut { guest_id }),
            _ => None,
        }
    }
}

/// Process billing events from a CSV reader.
///
/// This function uses streaming parsing to handle arbitrarily large CSV
/// files without loading the entire file into memory. Malformed rows and
/// invalid events are skipped; per-event billing errors are logged but
/// don't stop processing.
///
/// # CSV Format
///
/// Expected columns: `type, guest, ref, amount, area`
/// - `type`: Event type (checkin, charge, settle, checkout)
/// - `guest`: Guest ID (u32)
/// - `ref`: Bracelet code (checkin), description (charge), or payment
///   method (settle: `credit`/`card`)
/// - `amount`: Credit limit (checkin) or charge amount (charge)
/// - `area`: Service area for charges (restaurant, bar, spa, ...)
///
/// # Example
///
/// ```csv
/// type,guest,ref,amount,area
/// checkin,1,BR001,1000.00,
/// charge,1,Dinner,120.00,restaurant
/// settle,1,credit,,
/// checkout,1,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_events<R: Read>(reader: R) -> Result<BillingEngine, csv::Error> {
    let engine = BillingEngine::new();
    let gateway = AutoApproveGateway;
    let mut row = 0u64;

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " checkin "
        .flexible(true) // Allow missing trailing fields
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        row += 1;
        match result {
            Ok(record) => {
                let Some(event) = record.into_event() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid event record at row {}", row);
                    continue;
                };

                if let Err(e) = apply_event(&engine, event, row, &gateway) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping event at row {}: {}", row, e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(engine)
}

fn apply_event(
    engine: &BillingEngine,
    event: BillingEvent,
    row: u64,
    gateway: &AutoApproveGateway,
) -> Result<(), guest_ledger_rs::BillingError> {
    match event {
        BillingEvent::CheckIn {
            guest_id,
            bracelet,
            credit,
        } => {
            let today = Utc::now().date_naive();
            let guest = Guest {
                id: guest_id,
                name: format!("Guest {}", guest_id),
                email: None,
                phone: None,
                bracelet_code: bracelet,
                check_in: today,
                check_out: today + Days::new(1),
                room_id: None,
                is_vip: false,
                rating: 0,
                total_visits: 1,
            };
            engine.check_in(guest, credit)
        }
        BillingEvent::Charge {
            guest_id,
            description,
            amount,
            area,
        } => engine
            .add_charge(guest_id, NewCharge::new(description, amount, area))
            .map(|_| ()),
        BillingEvent::Settle { guest_id, method } => {
            let pending: Vec<_> = engine
                .charges(guest_id)?
                .into_iter()
                .filter(|c| !c.paid)
                .map(|c| c.id)
                .collect();
            engine
                .settle(
                    guest_id,
                    &pending,
                    method,
                    IdempotencyKey::new(format!("csv-{}", row)),
                    gateway,
                )
                .map(|_| ())
        }
        BillingEvent::CheckOut { guest_id } => engine.check_out(guest_id),
    }
}

/// Write guest account states to a CSV writer.
///
/// Outputs all accounts in CSV format with 2 decimal precision, in guest
/// ID order.
///
/// # CSV Format
///
/// Columns: `guest, name, initial, used, available, pending_charges, checked_out`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(engine: &BillingEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut accounts: Vec<_> = engine
        .accounts()
        .map(|entry| (*entry.key(), Arc::clone(entry.value())))
        .collect();
    accounts.sort_by_key(|(id, _)| id.0);

    for (_, account) in &accounts {
        wtr.serialize(&**account)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    #[test]
    fn parse_checkin_and_charge() {
        let csv = "type,guest,ref,amount,area\n\
                   checkin,1,BR001,1000.00,\n\
                   charge,1,Dinner,120.00,restaurant\n";
        let reader = Cursor::new(csv);

        let engine = process_events(reader).unwrap();

        let summary = engine.guest(GuestId(1)).unwrap();
        assert_eq!(summary.pending_charges, dec!(120.00));
        let credit = engine.credit(GuestId(1)).unwrap();
        assert_eq!(credit.available, dec!(1000.00));
    }

    #[test]
    fn parse_settle_sequence() {
        let csv = "type,guest,ref,amount,area\n\
                   checkin,1,BR001,1000.00,\n\
                   charge,1,Dinner,120.00,restaurant\n\
                   charge,1,Cocktails,85.00,bar\n\
                   settle,1,credit,,\n";
        let reader = Cursor::new(csv);

        let engine = process_events(reader).unwrap();

        let credit = engine.credit(GuestId(1)).unwrap();
        assert_eq!(credit.used, dec!(205.00));
        assert_eq!(credit.available, dec!(795.00));
        let summary = engine.guest(GuestId(1)).unwrap();
        assert_eq!(summary.pending_charges, dec!(0.00));
    }

    #[test]
    fn settle_beyond_credit_is_skipped() {
        let csv = "type,guest,ref,amount,area\n\
                   checkin,1,BR001,100.00,\n\
                   charge,1,Spa day,600.00,spa\n\
                   settle,1,credit,,\n";
        let reader = Cursor::new(csv);

        let engine = process_events(reader).unwrap();

        // Settlement was rejected; nothing changed.
        let credit = engine.credit(GuestId(1)).unwrap();
        assert_eq!(credit.used, dec!(0.00));
        let summary = engine.guest(GuestId(1)).unwrap();
        assert_eq!(summary.pending_charges, dec!(600.00));
    }

    #[test]
    fn parse_checkout_sequence() {
        let csv = "type,guest,ref,amount,area\n\
                   checkin,1,BR001,500.00,\n\
                   checkout,1,,,\n\
                   charge,1,Late charge,10.00,bar\n";
        let reader = Cursor::new(csv);

        let engine = process_events(reader).unwrap();

        // Charge after checkout was skipped.
        let summary = engine.guest(GuestId(1)).unwrap();
        assert_eq!(summary.total_charges, dec!(0.00));
    }

    #[test]
    fn parse_with_whitespace() {
        let csv = "type,guest,ref,amount,area\n checkin , 1 , BR001 , 250.00 ,\n";
        let reader = Cursor::new(csv);

        let engine = process_events(reader).unwrap();

        let credit = engine.credit(GuestId(1)).unwrap();
        assert_eq!(credit.initial, dec!(250.00));
    }

    #[test]
    fn skip_malformed_rows() {
        let csv = "type,guest,ref,amount,area\n\
                   checkin,1,BR001,100.00,\n\
                   invalid,row,data,here,\n\
                   checkin,2,BR002,50.00,\n";
        let reader = Cursor::new(csv);

        let engine = process_events(reader).unwrap();

        assert_eq!(engine.guests().len(), 2);
    }

    #[test]
    fn write_accounts_to_csv() {
        let csv_input = "type,guest,ref,amount,area\n\
                         checkin,1,BR001,100.50,\n\
                         checkin,2,BR002,200.25,\n";
        let reader = Cursor::new(csv_input);
        let engine = process_events(reader).unwrap();

        let mut output = Vec::new();
        write_accounts(&engine, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str
            .contains("guest,name,initial,used,available,pending_charges,checked_out"));
    }

    #[test]
    fn multiple_guests() {
        let csv = "type,guest,ref,amount,area\n\
                   checkin,3,BR003,10.00,\n\
                   checkin,1,BR001,20.00,\n\
                   checkin,2,BR002,30.00,\n";
        let reader = Cursor::new(csv);

        let engine = process_events(reader).unwrap();

        assert_eq!(engine.guests().len(), 3);
        assert_eq!(engine.credit(GuestId(1)).unwrap().initial, dec!(20.00));
        assert_eq!(engine.credit(GuestId(2)).unwrap().initial, dec!(30.00));
        assert_eq!(engine.credit(GuestId(3)).unwrap().initial, dec!(10.00));
    }
}
