use crate::domain::models::{ContextStats, FileRecord, GatherConfig};
use crate::infra::file_system::collect_files;
use crate::infra::remote_client::RemoteClient;
use log::{debug, info, warn};

#[derive(Debug, Default)]
pub struct GatheredContext {
    pub text: String,
    pub stats: ContextStats,
}

/// Expands `{path}` and `{content}` in one pass, so file content that happens
/// to contain `{path}` is left alone.
pub fn format_record(template: &str, record: &FileRecord) -> String {
    template
        .split("{content}")
        .map(|piece| piece.replace("{path}", &record.path))
        .collect::<Vec<_>>()
        .join(&record.content)
}

/// Joins formatted records with a newline between files. `on_file` sees every
/// path in traversal order.
pub fn aggregate(
    records: Vec<FileRecord>,
    template: &str,
    mut on_file: Option<&mut dyn FnMut(&str)>,
) -> String {
    let mut parts = Vec::with_capacity(records.len());
    for record in &records {
        debug!("Adding file {} ({} bytes)", record.path, record.content.len());
        if let Some(cb) = on_file.as_mut() {
            cb(&record.path);
        }
        parts.push(format_record(template, record));
    }
    parts.join("\n")
}

/// Character and line counts of the combined context: newlines plus one.
pub fn calculate_statistics(text: &str) -> (usize, usize) {
    let char_count = text.chars().count();
    let line_count = text.matches('\n').count() + 1;
    (char_count, line_count)
}

/// Rough local token estimate, about four characters per token.
pub fn estimate_token_count(char_count: usize) -> i32 {
    i32::try_from(char_count.div_ceil(4)).unwrap_or(i32::MAX)
}

/// Returns the token count and whether it is a local estimate.
pub fn count_tokens(client: Option<&dyn RemoteClient>, text: &str, char_count: usize) -> (i32, bool) {
    if text.is_empty() {
        return (0, false);
    }

    let Some(client) = client else {
        let estimate = estimate_token_count(char_count);
        info!("No model client available; token count is an estimate (~{} tokens)", estimate);
        return (estimate, true);
    };

    match client.count_tokens(text) {
        Ok(count) => (count.total, false),
        Err(e) => {
            let estimate = estimate_token_count(char_count);
            warn!(
                "Token counting failed ({}); using an estimate of ~{} tokens",
                e, estimate
            );
            (estimate, true)
        }
    }
}

/// Collects files, builds the context and measures it.
pub fn gather_context(
    config: &GatherConfig,
    client: Option<&dyn RemoteClient>,
    dry_run: bool,
) -> GatheredContext {
    info!("Gathering context from {} path(s)", config.paths.len());
    let outcome = collect_files(config);

    let mut processed_files = Vec::new();
    let mut record_path = |path: &str| processed_files.push(path.to_string());
    let on_file: Option<&mut dyn FnMut(&str)> = if dry_run {
        Some(&mut record_path)
    } else {
        None
    };
    let text = aggregate(outcome.records, &config.format, on_file);

    // Zero processed files is the only all-zero case; one empty file is a line.
    let (char_count, line_count) = if outcome.processed_count == 0 {
        (0, 0)
    } else {
        calculate_statistics(&text)
    };
    let (token_count, token_count_estimated) = count_tokens(client, &text, char_count);

    if outcome.processed_count == 0 {
        info!("No files matched the current filters");
    } else {
        info!(
            "Context: {} files, {} lines, {} chars, {} tokens{}",
            outcome.processed_count,
            line_count,
            char_count,
            token_count,
            if token_count_estimated { " (estimated)" } else { "" }
        );
    }

    GatheredContext {
        text,
        stats: ContextStats {
            processed_files_count: outcome.processed_count,
            char_count,
            line_count,
            token_count,
            token_count_estimated,
            processed_files,
        },
    }
}

pub fn build_prompt(instructions: &str, context: &str) -> String {
    debug!("Building prompt from {} chars of context", context.len());
    let mut result = String::new();

    result.push_str("<instructions>\n");
    result.push_str(instructions.trim());
    result.push_str("\n</instructions>\n\n");

    result.push_str("<context>\n");
    result.push_str(context);
    result.push_str("\n</context>\n");

    result
}
