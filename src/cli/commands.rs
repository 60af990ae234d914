use crate::core::confirmation::{BufLineReader, ConfirmationGate, FixedAnswer, LineReader};
use crate::core::context_generator::{build_prompt, gather_context};
use crate::core::dry_run::print_dry_run_report;
use crate::core::token_budget::check_token_limit;
use crate::domain::models::{DEFAULT_FORMAT, GatherConfig, LogLevel};
use crate::infra::logger::setup_logger;
use crate::infra::output::{ConsoleWriter, OutputWriter, write_generation};
use crate::infra::remote_client::{ApiError, DEFAULT_API_ENDPOINT, GeminiClient, RemoteClient};
use anyhow::{Context, bail};
use clap::Parser;
use log::{debug, error, info, warn};
use std::io::{self, Write};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_EXCLUDE_NAMES: &str = ".git,node_modules,target,vendor,dist,build";

#[derive(Parser)]
#[command(name = "thinktank")]
#[command(about = "Gather project context, check it against a model's token budget, and generate", long_about = None)]
pub struct Cli {
    /// Files or directories to gather context from
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Instructions sent to the model along with the context
    #[arg(long)]
    pub instructions: Option<String>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Comma-separated extensions to keep, e.g. ".rs,.toml"
    #[arg(long, default_value = "")]
    pub include: String,

    /// Comma-separated extensions to drop
    #[arg(long, default_value = "")]
    pub exclude: String,

    /// Comma-separated file or directory names to skip
    #[arg(long, default_value = DEFAULT_EXCLUDE_NAMES)]
    pub exclude_names: String,

    /// Per-file template with {path} and {content} placeholders
    #[arg(long, default_value = DEFAULT_FORMAT)]
    pub format: String,

    /// Show what would be sent without calling the model
    #[arg(long)]
    pub dry_run: bool,

    /// Ask before generating when the context reaches this many tokens (0 disables)
    #[arg(long, default_value_t = 0)]
    pub confirm_tokens: i32,

    /// Answer yes to the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Timeout in seconds for each request to the model API
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "THINKTANK_API_ENDPOINT", default_value = DEFAULT_API_ENDPOINT)]
    pub api_endpoint: String,
}

/// Orchestration knobs that are not part of gathering.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub instructions: String,
    pub dry_run: bool,
    pub confirm_tokens: i32,
}

impl Cli {
    pub fn gather_config(&self) -> GatherConfig {
        GatherConfig {
            paths: self.paths.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            exclude_names: self.exclude_names.clone(),
            format: self.format.clone(),
            verbose: self.verbose,
            log_level: self.log_level,
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            instructions: self.instructions.clone().unwrap_or_default(),
            dry_run: self.dry_run,
            confirm_tokens: self.confirm_tokens,
        }
    }

    fn build_client(&self) -> anyhow::Result<Option<GeminiClient>> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            if self.dry_run {
                warn!("GEMINI_API_KEY is not set; token counts will be estimated");
                return Ok(None);
            }
            bail!("GEMINI_API_KEY is not set; export it or pass --api-key");
        };

        let client = GeminiClient::new(
            api_key,
            &self.model,
            &self.api_endpoint,
            Duration::from_secs(self.timeout),
        )
        .context("failed to create model client")?;
        Ok(Some(client))
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let gather = cli.gather_config();
    setup_logger(gather.verbose, gather.log_level)?;

    let result = run_cli(&cli, &gather);
    if let Err(e) = &result {
        if let Some(api) = e.downcast_ref::<ApiError>() {
            error!("{}", api.user_facing());
        }
    }
    result
}

fn run_cli(cli: &Cli, gather: &GatherConfig) -> anyhow::Result<()> {
    info!("Starting thinktank");
    let run = cli.run_config();
    debug!("Gather config: {:?}", gather);
    debug!("Run config: dry_run={}, confirm_tokens={}", run.dry_run, run.confirm_tokens);

    let client = cli.build_client()?;
    let client = client.as_ref().map(|c| c as &dyn RemoteClient);

    let reader: Box<dyn LineReader> = if cli.yes {
        Box::new(FixedAnswer("y".to_string()))
    } else {
        Box::new(BufLineReader::stdin())
    };
    let mut gate = ConfirmationGate::new(reader, io::stderr());
    let mut writer = ConsoleWriter::stdout();

    execute(gather, &run, client, &mut gate, &mut io::stdout(), &mut writer)
}

/// Runs the pipeline: gather, then either report (dry run) or check the
/// budget, confirm, and generate.
pub fn execute<R: LineReader, W: Write>(
    gather: &GatherConfig,
    run: &RunConfig,
    client: Option<&dyn RemoteClient>,
    gate: &mut ConfirmationGate<R, W>,
    report_out: &mut dyn Write,
    writer: &mut dyn OutputWriter,
) -> anyhow::Result<()> {
    let context = gather_context(gather, client, run.dry_run);

    if run.dry_run {
        info!("Dry run: no request will be sent to the model");
        return print_dry_run_report(report_out, &context.stats, client);
    }

    if run.instructions.trim().is_empty() {
        bail!("--instructions is required unless --dry-run is set");
    }
    if context.stats.processed_files_count == 0 {
        warn!("No files matched; sending the instructions without project context");
    }

    let prompt = build_prompt(&run.instructions, &context.text);
    check_token_limit(client, &prompt)?;

    if !gate.prompt_for_confirmation(context.stats.token_count, run.confirm_tokens) {
        bail!("operation aborted by user");
    }

    let Some(client) = client else {
        bail!("remote client is not configured");
    };
    let result = client
        .generate_content(&prompt)
        .map_err(|e| e.in_phase("failed to generate content"))?;

    write_generation(writer, &result)
}
