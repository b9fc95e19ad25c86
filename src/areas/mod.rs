//! Infrastructure components
//!
//! - `log`: the read-only changed-path log interface and an in-memory
//!   recorded implementation
//! - `fixture`: a line-oriented text format for recorded logs, used by the
//!   CLI and the scenario tests
//! - `repository`: the session facade tying one log, layout and mapping
//!   version together

pub mod fixture;
pub mod log;
pub mod repository;
