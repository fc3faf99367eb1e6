//! SQLite storage backend for the PSP order engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
