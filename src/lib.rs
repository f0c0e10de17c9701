//! Library crate for stream-autoconnect exposing the probing pipeline.
pub mod candidates;
pub mod error;
pub mod logging;
pub mod port;
pub mod reachability;
pub mod scanner;
pub mod session;
pub mod types;
pub mod validator;
