use crate::cli::GlobalFlags;
use clap::Args;

#[derive(Args, Debug)]
pub struct ExposeArgs {
    /// ID of the box
    pub target: String,

    /// Port inside the box
    pub port: u16,

    /// Print the mapping as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ExposeArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let client = global.create_client()?;
    let sandbox = client.get_box(&args.target).await?;
    let exposed = sandbox.expose_port(args.port).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&exposed)?);
    } else {
        println!(
            "{} -> {} (expires {})",
            exposed.proxy_port,
            exposed.target_port,
            exposed.expires_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
