//! # Zelle Payment Gateway server
//!
//! This crate hosts the HTTP server for the Zelle payment gateway. It is responsible for:
//! * Running the background poller that scans the notification mailbox.
//! * Exposing manual scans, payment review (verify, reject, match) and reporting as a JSON API.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check that also reports whether the poller is running.
//! * `/api/scan`: Run a scan now.
//! * `/api/payments`, `/api/payments/{id}` and `/api/payments/{id}/{verify,reject,match}`: Payment records and review.
//! * `/api/payees` and `/api/payees/{id}/history`: Payees, their balances and audit trails.
//! * `/api/stats` and `/api/history`: Reporting.
//! * `/api/poller/{start,stop,status}`: Background poller control.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
