use crate::cli::GlobalFlags;
use clap::Args;
use comfy_table::{Attribute, Cell, Table, presets};
use tavor::BoxInfo;

/// List boxes
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show all boxes (default hides boxes that can no longer run)
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Only show IDs
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the raw records as JSON
    #[arg(long, conflicts_with = "quiet")]
    pub json: bool,
}

pub async fn execute(args: ListArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let client = global.create_client()?;
    let boxes: Vec<BoxInfo> = client
        .list_boxes()
        .await?
        .into_iter()
        .filter(|info| args.all || !info.status.is_terminal())
        .collect();

    if args.quiet {
        for info in boxes {
            println!("{}", info.id);
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&boxes)?);
        return Ok(());
    }

    print_info(&boxes);

    Ok(())
}

fn print_info(boxes: &[BoxInfo]) {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("STATUS").add_attribute(Attribute::Bold),
        Cell::new("CREATED").add_attribute(Attribute::Bold),
        Cell::new("TIMEOUT").add_attribute(Attribute::Bold),
        Cell::new("HOSTNAME").add_attribute(Attribute::Bold),
    ]);

    for info in boxes {
        let created = info
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let timeout = info.timeout.map(|s| format!("{}s", s)).unwrap_or_default();

        table.add_row(vec![
            info.id.clone(),
            info.status.to_string(),
            created,
            timeout,
            info.hostname.clone().unwrap_or_default(),
        ]);
    }

    println!("{table}");
}
