//! Driver-manager back-end: the generic marshaling engine over the
//! call-level-interface protocol.
//!
//! The engine is written once, generic over the [`api::CliApi`] call
//! surface; the production surface is resolved from a runtime-loaded client
//! library, and any vendor client that can express the same calls plugs in
//! through [`OdbcDriver::with_api`] without duplicating the engine.

pub mod api;
pub mod connection;
pub mod fetch;
pub mod library;
pub mod statement;
pub mod sys;

pub use connection::{DriverConfig, NumericEncoding, OdbcDriver};
pub use library::OdbcLibrary;
pub use statement::OdbcStatement;
