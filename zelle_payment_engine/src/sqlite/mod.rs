//! SQLite storage backend for the Zelle Payment Engine.
//!
//! The schema lives in `migrations/` and is embedded into the binary; call [`SqliteDatabase::run_migrations`] once at
//! start-up.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
