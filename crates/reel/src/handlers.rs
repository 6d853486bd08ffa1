//! Bundled protocol handlers.
//!
//! [`PingProbe`] is the illustrative domain handler: issue one probe
//! command, parse its summary line, classify into the tri-state outcome.
//! Domain handlers built on this crate follow the same template.
//! [`EchoLogger`] and [`LineFeeder`] are protocol utilities: a pure
//! observer for putting session traffic in the logs, and a scripted
//! command feeder for driving a shell line by line.

pub mod echo;
pub mod feeder;
pub mod ping;

pub use echo::{EchoLogger, Observation};
pub use feeder::LineFeeder;
pub use ping::PingProbe;
