//! Tavor - client SDK for remote sandbox boxes.
//!
//! Create an ephemeral box, run shell commands inside it and collect or
//! stream their output.
//!
//! ```rust,no_run
//! use tavor::{BoxConfig, ClientOptions, CommandOptions, TavorClient};
//!
//! # async fn example() -> tavor::TavorResult<()> {
//! let client = TavorClient::new(ClientOptions::new().api_key("sk-tavor-..."))?;
//! let sandbox = client.create_box(BoxConfig::new().cpu(2).mib_ram(2048)).await?;
//!
//! // Polled: output arrives with the result
//! let result = sandbox.run("python3 --version", CommandOptions::new()).await?;
//! println!("{} (exit {})", result.stdout.trim(), result.exit_code);
//!
//! // Streamed: every line as soon as it is produced
//! sandbox
//!     .run(
//!         "for i in 1 2 3; do echo $i; sleep 1; done",
//!         CommandOptions::new().on_stdout(|line: &str| println!("> {}", line)),
//!     )
//!     .await?;
//!
//! sandbox.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The thread-blocking equivalent lives in [`blocking`] (feature `blocking`,
//! enabled by default).

mod api;
pub mod client;
pub mod config;
pub mod litebox;
pub mod protocol;
pub mod types;

#[cfg(feature = "blocking")]
pub mod blocking;

pub use client::TavorClient;
pub use config::{BoxDefaults, ClientConfig, ClientOptions};
pub use litebox::{BoxHandle, BoxState, BoxStatus, CommandOptions};
pub use protocol::OutputSink;
pub use types::{
    BoxConfig, BoxId, BoxInfo, CommandId, CommandResult, CommandStatus, ExitCodeSource,
    ExposedPort,
};

pub use tavor_shared::errors::{TavorError, TavorResult};
