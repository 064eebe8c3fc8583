//! Library side of the `fieldlink` binary: configuration, input documents and
//! logging setup.

pub mod config;
pub mod input;
pub mod logging;
