use clap::Args;

#[derive(Args, Debug)]
pub struct PauseArgs {
    /// ID of the box(es)
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: PauseArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    super::for_each_box(args.targets, "pause", global, |sandbox| async move {
        sandbox.pause().await
    })
    .await
}

pub async fn resume(args: PauseArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    super::for_each_box(args.targets, "resume", global, |sandbox| async move {
        sandbox.resume().await
    })
    .await
}
