use crate::cli::GlobalFlags;
use clap::Args;

#[derive(Args, Debug)]
pub struct UrlArgs {
    /// ID of the box
    pub target: String,

    /// Port inside the box
    pub port: u16,
}

pub async fn execute(args: UrlArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let client = global.create_client()?;
    let sandbox = client.get_box(&args.target).await?;
    println!("{}", sandbox.public_url(args.port)?);
    Ok(())
}
