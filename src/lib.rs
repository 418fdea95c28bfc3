pub mod config;
pub mod dispatch;
pub mod error;
pub mod response;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
pub mod store;
pub mod views;

#[cfg(test)]
pub mod testing;
