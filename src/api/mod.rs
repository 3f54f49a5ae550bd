// HTTP API for the token exchange service and connection lifecycle

pub mod connection;
pub mod exchange;

pub use connection::{create_connection_router, ConnectionAppState};
pub use exchange::{create_exchange_router, ExchangeAppState};
