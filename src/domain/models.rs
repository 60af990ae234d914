#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
}

/// Inputs for a single gather run, built by the CLI layer.
///
/// `include`, `exclude` and `exclude_names` are kept as the comma-separated
/// strings the user typed; the collector normalizes them.
#[derive(Debug, Clone)]
pub struct GatherConfig {
    pub paths: Vec<String>,
    pub include: String,
    pub exclude: String,
    pub exclude_names: String,
    pub format: String,
    pub verbose: bool,
    pub log_level: LogLevel,
}

pub const DEFAULT_FORMAT: &str = "<{path}>\n```\n{content}\n```\n</{path}>\n";

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            include: String::new(),
            exclude: String::new(),
            exclude_names: String::new(),
            format: DEFAULT_FORMAT.to_string(),
            verbose: false,
            log_level: LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStats {
    pub processed_files_count: usize,
    pub char_count: usize,
    pub line_count: usize,
    pub token_count: i32,
    /// True when `token_count` came from the local heuristic rather than the
    /// remote tokenizer.
    pub token_count_estimated: bool,
    /// Only populated in dry-run mode.
    pub processed_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenResult {
    pub token_count: i32,
    pub input_limit: i32,
    pub exceeds_limit: bool,
    pub limit_error: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCount {
    pub total: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub input_limit: i32,
    pub output_limit: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub content: String,
    pub finish_reason: Option<String>,
    pub truncated: bool,
}
