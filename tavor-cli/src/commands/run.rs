use crate::cli::{CommandFlags, GlobalFlags, ResourceFlags};
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub resource: ResourceFlags,

    #[command(flatten)]
    pub flags: CommandFlags,

    /// Leave the box running afterwards and print its ID to stderr
    #[arg(long)]
    pub keep: bool,

    /// Command to run inside the box (joined with spaces, run by the box shell)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Entry point
pub async fn execute(args: RunArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let client = global.create_client()?;
    let sandbox = client.create_box(args.resource.to_config()?).await?;
    tracing::info!(box_id = %sandbox.id(), "Box created");

    let outcome = tokio::select! {
        result = super::run_in_box(&sandbox, &args.command, &args.flags) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    if args.keep && outcome.is_some() {
        eprintln!("{}", sandbox.id());
    } else if let Err(e) = sandbox.stop().await {
        eprintln!("Error: failed to stop box '{}': {}", sandbox.id(), e);
    }

    let Some(result) = outcome else {
        // Interrupted; the box is already gone
        std::process::exit(130);
    };

    let code = super::exit_code(&result?);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
