use clap::Args;

#[derive(Args, Debug)]
pub struct StopArgs {
    /// ID of the box(es) to stop
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: StopArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    super::for_each_box(args.targets, "stop", global, |sandbox| async move {
        sandbox.stop().await
    })
    .await
}
