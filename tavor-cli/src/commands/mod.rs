pub mod create;
pub mod exec;
pub mod expose;
pub mod list;
pub mod pause;
pub mod run;
pub mod stop;
pub mod url;

use crate::cli::CommandFlags;
use std::io::Write;
use tavor::{BoxHandle, CommandResult};

/// Run `command` in `sandbox`, streaming lines to our stdout/stderr unless
/// `--no-stream` was given, in which case buffered output is printed at the
/// end.
pub(crate) async fn run_in_box(
    sandbox: &BoxHandle,
    command: &[String],
    flags: &CommandFlags,
) -> tavor::TavorResult<CommandResult> {
    let command = command.join(" ");
    tracing::debug!(box_id = %sandbox.id(), command = %command, "Running command");

    if flags.no_stream {
        let result = sandbox.run(&command, flags.base_options()).await?;
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
        let _ = std::io::stdout().flush();
        return Ok(result);
    }

    let options = flags
        .base_options()
        .on_stdout(|line: &str| println!("{}", line))
        .on_stderr(|line: &str| eprintln!("{}", line));
    sandbox.run(&command, options).await
}

/// Process exit code for a finished command, always within 0..=255 so a
/// failure never wraps around to success.
pub(crate) fn exit_code(result: &CommandResult) -> i32 {
    match result.exit_code {
        0 => 0,
        // Shell convention for signals: 128 + signal number
        code if code < 0 => 128 + code.unsigned_abs().min(127) as i32,
        code => code.min(255),
    }
}

/// Apply `op` to every target, printing each one that succeeded, and bail
/// with a summary if any failed.
pub(crate) async fn for_each_box<F, Fut>(
    targets: Vec<String>,
    action: &str,
    global: &crate::cli::GlobalFlags,
    op: F,
) -> anyhow::Result<()>
where
    F: Fn(BoxHandle) -> Fut,
    Fut: Future<Output = tavor::TavorResult<()>>,
{
    let client = global.create_client()?;

    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in targets {
        let sandbox = match client.get_box(&target).await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                eprintln!("Error: {}", e);
                errors.push(format!("{}: {}", target, e));
                continue;
            }
        };

        if let Err(e) = op(sandbox).await {
            eprintln!("Error: failed to {} box '{}': {}", action, target, e);
            errors.push(format!("{}: {}", target, e));
        } else {
            println!("{}", target);
            success_count += 1;
        }
    }

    if !errors.is_empty() {
        let error_summary = if success_count > 0 {
            format!(
                "Failed to {} {} of {} box(es)",
                action,
                errors.len(),
                errors.len() + success_count
            )
        } else {
            format!("Failed to {} all {} box(es)", action, errors.len())
        };

        anyhow::bail!("{}\nErrors:\n  {}", error_summary, errors.join("\n  "));
    }
    Ok(())
}
