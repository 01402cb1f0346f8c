//! Simple REST API server example for the billing engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `GET /api/guests` - List all checked-in guests
//! - `GET /api/guests/bracelet/{code}` - Look up a guest by bracelet scan
//! - `GET /api/guests/{id}/charges` - List a guest's charges
//! - `GET /api/guests/{id}/credit` - Get a guest's credit balance
//! - `GET /api/guests/{id}/transactions` - List a guest's settlements
//! - `POST /api/guests/{id}/charges` - Post a charge
//! - `POST /api/guests/{id}/settle` - Settle selected pending charges
//! - `GET /api/rooms` - List rooms
//! - `PUT /api/rooms/{id}/status` - Update a room's status
//! - `GET /api/stats` - Dashboard statistics
//!
//! ## Example Usage
//!
//! ```bash
//! # Scan a bracelet
//! curl http://localhost:3000/api/guests/bracelet/BR001
//!
//! # Post a charge
//! curl -X POST http://localhost:3000/api/guests/1/charges \
//!   -H "Content-Type: application/json" \
//!   -d '{"description": "Dinner", "amount": "120.00", "area": "restaurant", "source": "pos"}'
//!
//! # Settle against the credit account
//! curl -X POST http://localhost:3000/api/guests/1/settle \
//!   -H "Content-Type: application/json" \
//!   -d '{"charge_ids": [1], "payment_method": {"type": "credit_account"}, "idempotency_key": "pos-1"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDate;
use guest_ledger_rs::{
    AutoApproveGateway, BillingEngine, BillingError, BraceletCode, Charge, CreditBalance,
    DashboardStats, Guest, GuestId, GuestSummary, IdempotencyKey, NewCharge, PaymentMethod, Room,
    RoomId, RoomStatus, RoomType, Settlement,
};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for settling charges.
///
/// ```json
/// {"charge_ids": [1, 2], "payment_method": {"type": "credit_account"}, "idempotency_key": "pos-7"}
/// ```
#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub charge_ids: Vec<u64>,
    pub payment_method: PaymentMethod,
    pub idempotency_key: String,
}

/// Request body for updating a room's status.
#[derive(Debug, Deserialize)]
pub struct RoomStatusRequest {
    pub status: String,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Envelope for `GET /api/guests`.
#[derive(Debug, Serialize)]
pub struct GuestsResponse {
    pub guests: Vec<GuestSummary>,
}

/// Envelope for `GET /api/rooms`.
#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<Room>,
}

/// Envelope for `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: DashboardStats,
}

/// Envelope for `PUT /api/rooms/{id}/status`.
#[derive(Debug, Serialize)]
pub struct RoomStatusResponse {
    pub success: bool,
    pub room: Room,
}

// === Application State ===

/// Shared application state containing the billing engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BillingEngine>,
    pub gateway: Arc<AutoApproveGateway>,
}

// === Error Handling ===

/// Wrapper for converting `BillingError` into HTTP responses.
pub struct AppError(BillingError);

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BillingError::InvalidAmount
            | BillingError::EmptySelection
            | BillingError::GuestMismatch => StatusCode::BAD_REQUEST,
            BillingError::GuestNotFound
            | BillingError::BraceletNotFound
            | BillingError::RoomNotFound
            | BillingError::ChargeNotFound => StatusCode::NOT_FOUND,
            BillingError::AlreadyPaid
            | BillingError::StaleCharge
            | BillingError::DuplicateSettlement
            | BillingError::DuplicateGuest
            | BillingError::BraceletInUse => StatusCode::CONFLICT,
            BillingError::InsufficientCredit => StatusCode::UNPROCESSABLE_ENTITY,
            BillingError::CheckedOut => StatusCode::FORBIDDEN,
            BillingError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            BillingError::GatewayDeclined => StatusCode::BAD_GATEWAY,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: self.0.kind().to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// GET /api/guests - List all checked-in guests.
async fn list_guests(State(state): State<AppState>) -> Json<GuestsResponse> {
    Json(GuestsResponse {
        guests: state.engine.guests(),
    })
}

/// GET /api/guests/bracelet/{code} - Look up a guest by bracelet scan.
async fn lookup_bracelet(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<GuestSummary>, AppError> {
    let summary = state.engine.lookup_bracelet(&BraceletCode::new(code))?;
    Ok(Json(summary))
}

/// GET /api/guests/{id}/charges - List a guest's charges.
async fn list_charges(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<Charge>>, AppError> {
    Ok(Json(state.engine.charges(GuestId(id))?))
}

/// POST /api/guests/{id}/charges - Post a charge against a stay.
async fn create_charge(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<NewCharge>,
) -> Result<(StatusCode, Json<Charge>), AppError> {
    let charge = state.engine.add_charge(GuestId(id), request)?;
    Ok((StatusCode::CREATED, Json(charge)))
}

/// GET /api/guests/{id}/credit - Get a guest's credit balance.
async fn get_credit(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<CreditBalance>, AppError> {
    Ok(Json(state.engine.credit(GuestId(id))?))
}

/// GET /api/guests/{id}/transactions - List a guest's settlements.
async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<Settlement>>, AppError> {
    Ok(Json(state.engine.transactions(GuestId(id))?))
}

/// POST /api/guests/{id}/settle - Settle selected pending charges.
async fn settle(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<SettleRequest>,
) -> Result<Json<Settlement>, AppError> {
    let selection: Vec<_> = request
        .charge_ids
        .into_iter()
        .map(guest_ledger_rs::ChargeId)
        .collect();

    let settlement = state.engine.settle(
        GuestId(id),
        &selection,
        request.payment_method,
        IdempotencyKey::new(request.idempotency_key),
        state.gateway.as_ref(),
    )?;
    Ok(Json(settlement))
}

/// GET /api/rooms - List rooms.
async fn list_rooms(State(state): State<AppState>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        rooms: state.engine.rooms(),
    })
}

/// PUT /api/rooms/{id}/status - Update a room's status.
async fn update_room_status(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<RoomStatusRequest>,
) -> Result<Json<RoomStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let status = RoomStatus::parse(&request.status).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("unknown room status '{}'", request.status),
                code: "INVALID_ROOM_STATUS".to_string(),
            }),
        )
    })?;

    state
        .engine
        .update_room_status(RoomId(id), status)
        .map(|room| Json(RoomStatusResponse {
            success: true,
            room,
        }))
        .map_err(|err| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: err.kind().to_string(),
                }),
            )
        })
}

/// GET /api/stats - Dashboard statistics.
async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.engine.stats(),
    })
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/guests", get(list_guests))
        .route("/api/guests/bracelet/{code}", get(lookup_bracelet))
        .route(
            "/api/guests/{id}/charges",
            get(list_charges).post(create_charge),
        )
        .route("/api/guests/{id}/credit", get(get_credit))
        .route("/api/guests/{id}/transactions", get(list_transactions))
        .route("/api/guests/{id}/settle", post(settle))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/{id}/status", put(update_room_status))
        .route("/api/stats", get(get_stats))
        .with_state(state)
}

// === Demo Data ===

fn seed(engine: &BillingEngine) {
    engine.add_room(Room {
        id: RoomId(101),
        number: "101".to_string(),
        room_type: RoomType::Double,
        status: RoomStatus::Available,
        floor: 1,
        price_per_night: dec!(180.00),
        guest_id: None,
    });
    engine.add_room(Room {
        id: RoomId(205),
        number: "205".to_string(),
        room_type: RoomType::Suite,
        status: RoomStatus::Available,
        floor: 2,
        price_per_night: dec!(320.00),
        guest_id: None,
    });

    let guest = Guest {
        id: GuestId(1),
        name: "Carlos Mendez".to_string(),
        email: Some("carlos@example.com".to_string()),
        phone: None,
        bracelet_code: BraceletCode::new("BR001"),
        check_in: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        check_out: NaiveDate::from_ymd_opt(2024, 1, 18).unwrap(),
        room_id: Some(RoomId(205)),
        is_vip: true,
        rating: 5,
        total_visits: 3,
    };
    engine
        .check_in(guest, dec!(1000.00))
        .expect("seeding demo guest");
    engine
        .add_charge(
            GuestId(1),
            NewCharge::new(
                "Dinner",
                dec!(120.00),
                guest_ledger_rs::ServiceArea::Restaurant,
            ),
        )
        .expect("seeding demo charge");
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let engine = Arc::new(BillingEngine::new());
    seed(&engine);

    let state = AppState {
        engine,
        gateway: Arc::new(AutoApproveGateway),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Guest billing API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  GET  /api/guests                    - List guests");
    println!("  GET  /api/guests/bracelet/:code     - Look up by bracelet");
    println!("  GET  /api/guests/:id/charges        - List charges");
    println!("  POST /api/guests/:id/charges        - Post a charge");
    println!("  GET  /api/guests/:id/credit         - Credit balance");
    println!("  GET  /api/guests/:id/transactions   - Settlement history");
    println!("  POST /api/guests/:id/settle         - Settle charges");
    println!("  GET  /api/rooms                     - List rooms");
    println!("  PUT  /api/rooms/:id/status          - Update room status");
    println!("  GET  /api/stats                     - Dashboard stats");

    axum::serve(listener, app).await.unwrap();
}
