use crate::core::token_budget::token_result;
use crate::domain::models::ContextStats;
use crate::infra::remote_client::RemoteClient;
use crossterm::{
    QueueableCommand,
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
};
use log::{error, warn};
use std::io::Write;

fn heading<W: Write + ?Sized>(out: &mut W, text: &str) -> anyhow::Result<()> {
    out.queue(SetAttribute(Attribute::Bold))?;
    out.queue(SetForegroundColor(Color::Cyan))?;
    write!(out, "{}", text)?;
    out.queue(ResetColor)?;
    out.queue(SetAttribute(Attribute::Reset))?;
    writeln!(out)?;
    Ok(())
}

/// Prints what a real run would send. Remote failures only downgrade the
/// report; write errors on `out` are the only way this fails.
pub fn print_dry_run_report<W: Write + ?Sized>(
    out: &mut W,
    stats: &ContextStats,
    client: Option<&dyn RemoteClient>,
) -> anyhow::Result<()> {
    heading(out, "Files that would be included:")?;
    if stats.processed_files_count == 0 {
        writeln!(out, "  No files matched the current filters.")?;
    } else {
        for (i, path) in stats.processed_files.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, path)?;
        }
    }
    writeln!(out)?;

    heading(out, "Context statistics:")?;
    writeln!(out, "  Files:      {}", stats.processed_files_count)?;
    writeln!(out, "  Lines:      {}", stats.line_count)?;
    writeln!(out, "  Characters: {}", stats.char_count)?;
    if stats.token_count_estimated {
        writeln!(out, "  Tokens:     ~{} (estimated)", stats.token_count)?;
    } else {
        writeln!(out, "  Tokens:     {}", stats.token_count)?;
    }

    let Some(client) = client else {
        warn!("No model client configured; skipping token limit comparison");
        out.flush()?;
        return Ok(());
    };

    let info = match client.model_info() {
        Ok(info) => info,
        Err(e) => {
            warn!("Could not fetch model info; skipping token limit comparison: {}", e);
            out.flush()?;
            return Ok(());
        }
    };

    let result = token_result(stats.token_count, info.input_limit);
    writeln!(out)?;
    heading(out, "Token limit:")?;
    writeln!(out, "  Model:      {}", info.name)?;
    writeln!(out, "  Limit:      {} input / {} output", info.input_limit, info.output_limit)?;
    writeln!(out, "  Usage:      {:.1}%", result.percentage)?;

    if result.exceeds_limit {
        let hint = format!(
            "{}. Try narrowing the context with --include, --exclude or --exclude-names.",
            result.limit_error
        );
        error!("{}", hint);
        writeln!(out)?;
        out.queue(SetForegroundColor(Color::Red))?;
        write!(out, "  {}", hint)?;
        out.queue(ResetColor)?;
        writeln!(out)?;
    }

    out.flush()?;
    Ok(())
}
