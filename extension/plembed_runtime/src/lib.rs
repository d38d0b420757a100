//! Execution state and transaction lifecycle of an embedded procedural
//! language.
//!
//! A [`Runtime`] sits between a host database ([`host::Host`]) and an
//! embedded interpreter ([`interpreter::Interpreter`]). Every call from the
//! host into interpreted code goes through [`Runtime::handle`], which
//! resolves a per-call cache, runs the procedure in the requested mode and
//! checks on the way out that the procedure left the host's transaction in
//! the state it found it. Interpreted code calls back through
//! [`session::Session`]: opening and closing subtransactions, executing
//! statements and raising host errors as exceptions.

pub mod bridge;
pub mod cache;
pub mod call;
pub mod config;
pub mod datum;
pub mod descriptor;
pub mod dispatch;
pub mod epoch;
pub mod exception;
pub mod host;
pub mod inline;
pub mod interpreter;
pub mod ist;
pub mod live;
pub mod normalize;
pub mod procedure;
pub mod runtime;
pub mod session;
pub mod signal;
pub mod srf;
pub mod state;
pub mod stateful;
pub mod trigger;
pub mod xact;

pub use runtime::Runtime;
