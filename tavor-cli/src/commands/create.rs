use crate::cli::{GlobalFlags, ResourceFlags};
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub resource: ResourceFlags,

    /// Return immediately instead of waiting for the box to be running
    #[arg(short, long)]
    pub detach: bool,

    /// Seconds to wait for the box to become ready
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub ready_timeout: u64,
}

pub async fn execute(args: CreateArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let client = global.create_client()?;
    let sandbox = client.create_box(args.resource.to_config()?).await?;

    if !args.detach
        && let Err(e) = sandbox
            .wait_until_ready_with(
                Some(Duration::from_secs(args.ready_timeout)),
                Duration::from_secs(1),
            )
            .await
    {
        // Never leave behind a box that did not come up
        if let Err(stop_err) = sandbox.stop().await {
            tracing::warn!(box_id = %sandbox.id(), error = %stop_err, "Failed to stop box");
        }
        return Err(e.into());
    }

    println!("{}", sandbox.id());
    Ok(())
}
