//! Thread-blocking client.
//!
//! Same operations and semantics as the async [`TavorClient`](crate::TavorClient),
//! for callers without a runtime. Waits use `std::thread::sleep`.
//!
//! Must not be used from inside an async runtime.
//!
//! ```rust,no_run
//! use tavor::blocking::TavorClient;
//! use tavor::{BoxConfig, ClientOptions, CommandOptions};
//!
//! # fn main() -> tavor::TavorResult<()> {
//! let client = TavorClient::new(ClientOptions::new())?;
//! let result = client.with_box(BoxConfig::new(), |sandbox| {
//!     sandbox.run("uname -a", CommandOptions::new())
//! })?;
//! println!("{}", result.stdout);
//! # Ok(())
//! # }
//! ```

mod client;
mod litebox;

pub use client::TavorClient;
pub use litebox::BoxHandle;
