use prometheus::Registry;
use std::sync::Arc;

use seatline_booking::BookingCoordinator;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BookingCoordinator>,
    pub auth: AuthConfig,
    pub registry: Registry,
}
