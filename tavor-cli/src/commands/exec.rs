use crate::cli::{CommandFlags, GlobalFlags};
use clap::Args;

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub flags: CommandFlags,

    /// ID of the box to run in
    pub target: String,

    /// Command to run inside the box (joined with spaces, run by the box shell)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

pub async fn execute(args: ExecArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let client = global.create_client()?;
    let sandbox = client.get_box(&args.target).await?;

    let result = super::run_in_box(&sandbox, &args.command, &args.flags).await?;
    let code = super::exit_code(&result);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
