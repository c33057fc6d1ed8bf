//! Command-execution engine, free of I/O.
//!
//! Both the async and the blocking drivers push server data through these
//! types, so polling and streaming behave identically in either model.

mod output;
pub(crate) mod poll;
pub(crate) mod stream;

pub use output::OutputSink;
pub(crate) use stream::StreamSession;
