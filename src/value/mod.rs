//! Value types exchanged between the embedding value system and the engine.
//!
//! Arbitrary-precision integers and rationals come from `num-bigint` /
//! `num-rational`; strings, byte-strings, booleans and floats are plain Rust
//! types. The two composite kinds that need their own representation are the
//! seven-component [`Duration`] and the calendar [`Timestamp`].

pub mod duration;
pub mod time;

pub use duration::Duration;
pub use time::{time_of_day, LocalZone, TimeZoneService, Timestamp};
