use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indicatif::ProgressBar;
use output::{OutputFormat, Renderer};
use progress::spinner;
use report_router_core::{bootstrap, DispatchRequest, DispatchTarget, Dispatcher, DEFAULT_LIMIT};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "report-router",
    version,
    about = "Route plain-language questions to reporting handlers and print the resulting tables."
)]
struct Cli {
    /// Renderer for command output.
    #[arg(long, global = true, value_enum, default_value = "markdown")]
    format: OutputFormat,
    /// Settings file (TOML, YAML or JSON). Defaults to `report-router.toml` in the user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// YAML file with extra routing rules; overrides `rules_file` from settings.
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    /// Disable ANSI colors in CLI output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical CLI output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators for long-running tasks.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Run the JSON-RPC server over STDIO.
    Serve,
    /// Show which intent and rule a question maps to, without fetching.
    Classify { text: String },
    /// Fetch and render a report for a question or an explicit mode.
    Dispatch(DispatchArgs),
    /// List known intents and their aliases.
    Intents,
    /// List registered handler modes.
    Modes,
    /// List routing rules in evaluation order.
    Rules,
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["text", "mode"])))]
struct DispatchArgs {
    /// Plain-language question to classify.
    #[arg(long)]
    text: Option<String>,
    /// Handler mode to call directly.
    #[arg(long)]
    mode: Option<String>,
    #[arg(long, default_value_t = 0)]
    skip: u64,
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: u64,
}

impl DispatchArgs {
    fn request(&self) -> Result<DispatchRequest> {
        let target = match (&self.text, &self.mode) {
            (Some(text), None) => DispatchTarget::Text(text.clone()),
            (None, Some(mode)) => DispatchTarget::Mode(mode.clone()),
            _ => return Err(anyhow!("pass exactly one of --text or --mode")),
        };
        Ok(DispatchRequest {
            target,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if let Command::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "report-router", &mut std::io::stdout());
        return Ok(());
    }

    let mut settings = settings::load(cli.config.as_deref())?;
    if let Some(rules) = &cli.rules {
        settings.rules_file = Some(rules.clone());
    }
    debug!(target: "report_router_cli", settings = ?settings, "settings resolved");

    let runtime = bootstrap(settings).await?;
    let dispatcher = runtime.dispatcher();
    let renderer = Renderer::new(cli.format);

    match &cli.command {
        Command::Serve => runtime.serve().await,
        Command::Classify { text } => {
            let classification = dispatcher.engine().explain(text);
            if cli.quiet {
                return Ok(());
            }
            renderer.classification(text, classification.as_ref())
        }
        Command::Dispatch(args) => handle_dispatch(args, &cli, &renderer, &dispatcher).await,
        Command::Intents => {
            if cli.quiet {
                return Ok(());
            }
            renderer.intents(&dispatcher)
        }
        Command::Modes => {
            if cli.quiet {
                return Ok(());
            }
            renderer.modes(dispatcher.registry())
        }
        Command::Rules => {
            if cli.quiet {
                return Ok(());
            }
            renderer.rules(dispatcher.engine().rules())
        }
        Command::Completions { .. } => Ok(()),
    }
}

async fn handle_dispatch(
    args: &DispatchArgs,
    cli: &Cli,
    renderer: &Renderer,
    dispatcher: &Dispatcher,
) -> Result<()> {
    let request = args.request()?;
    let label = match &request.target {
        DispatchTarget::Text(text) => format!("Answering `{text}`..."),
        DispatchTarget::Mode(mode) => format!("Loading `{mode}` records..."),
    };
    let spinner = spinner(cli.progress_enabled(), label);

    match dispatcher.dispatch(&request).await {
        Ok(outcome) => {
            finish_spinner(
                spinner,
                Some(format!("{} rows from {}", outcome.total_rows, outcome.source_label)),
            );
            if cli.quiet {
                return Ok(());
            }
            if outcome.truncated {
                eprintln!(
                    "showing {} of {} rows; narrow the request or page with --skip/--limit",
                    outcome.rendered_rows, outcome.total_rows
                );
            }
            renderer.outcome(&outcome)
        }
        Err(error) => {
            finish_spinner(spinner, None);
            let message = error.user_message();
            Err(anyhow::Error::new(error).context(message))
        }
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let default_level = if cli.quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>, message: Option<String>) {
    if let Some(progress) = spinner {
        if let Some(msg) = message {
            progress.finish_with_message(msg);
        } else {
            progress.finish_and_clear();
        }
    }
}

mod settings {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use config::{Config, Environment, File, FileFormat, FileSourceFile};
    use directories::ProjectDirs;
    use report_router_core::Settings;

    pub const ENV_PREFIX: &str = "REPORT_ROUTER";
    const CONFIG_FILE_NAME: &str = "report-router.toml";

    /// `report-router.toml` in the platform config directory, when one exists.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "report-router", "report-router")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Defaults, then the config file, then `REPORT_ROUTER_*` variables.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Settings> {
        let file = match explicit {
            Some(path) => Some(File::from(path).required(true)),
            None => default_config_path().map(|path| File::from(path).required(false)),
        };
        load_from(file, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn load_from(
        file: Option<File<FileSourceFile, FileFormat>>,
        environment: Environment,
    ) -> Result<Settings> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(file);
        }
        let settings: Settings = builder
            .add_source(environment)
            .build()
            .context("failed to read settings")?
            .try_deserialize()
            .context("settings have an unexpected shape")?;
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }

}

mod output {
    use std::io;

    use anyhow::Result;
    use clap::ValueEnum;
    use report_router_core::{
        registry::HandlerRegistry, rules::CompiledRule, Classification, DispatchOutcome,
        Dispatcher,
    };
    use serde_json::json;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
    pub enum OutputFormat {
        Markdown,
        Csv,
        Json,
    }

    #[derive(Copy, Clone, Debug)]
    pub struct Renderer {
        format: OutputFormat,
    }

    impl Renderer {
        pub fn new(format: OutputFormat) -> Self {
            Self { format }
        }

        pub fn outcome(&self, outcome: &DispatchOutcome) -> Result<()> {
            match self.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
                OutputFormat::Markdown => println!("{}", outcome.rendered_markdown),
                OutputFormat::Csv => print!("{}", outcome.rendered_csv.as_deref().unwrap_or_default()),
            }
            Ok(())
        }

        pub fn classification(&self, text: &str, found: Option<&Classification>) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "text": text, "classification": found });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => match found {
                    Some(found) => {
                        println!("| Intent | Rule | Priority | Source | Action |");
                        println!("| --- | --- | ---: | --- | --- |");
                        println!(
                            "| `{}` | `{}` | {} | {} | {} |",
                            found.intent,
                            found.rule,
                            found.priority,
                            source_name(found.source),
                            found.action
                        );
                    }
                    None => println!("No rule matched `{text}`."),
                },
                OutputFormat::Csv => {
                    let records = found.map(|found| {
                        vec![
                            found.intent.to_string(),
                            found.rule.clone(),
                            found.priority.to_string(),
                            source_name(found.source).to_string(),
                            found.action.clone(),
                        ]
                    });
                    write_csv(
                        io::stdout().lock(),
                        &["intent", "rule", "priority", "source", "action"],
                        records,
                    )?;
                }
            }
            Ok(())
        }

        pub fn intents(&self, dispatcher: &Dispatcher) -> Result<()> {
            let taxonomy = dispatcher.engine().taxonomy();
            match self.format {
                OutputFormat::Json => {
                    let intents: Vec<_> = taxonomy
                        .specs()
                        .map(|(intent, spec)| json!({ "value": intent, "spec": spec }))
                        .collect();
                    let aliases: serde_json::Map<String, serde_json::Value> = taxonomy
                        .aliases()
                        .map(|(alias, intent)| (alias.to_string(), json!(intent)))
                        .collect();
                    let payload = json!({ "intents": intents, "aliases": aliases });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    println!("| Intent | Description | Aliases | Handled |");
                    println!("| --- | --- | --- | --- |");
                    for (intent, spec) in taxonomy.specs() {
                        let aliases: Vec<&str> = taxonomy
                            .aliases()
                            .filter(|(_, target)| *target == intent)
                            .map(|(alias, _)| alias)
                            .collect();
                        println!(
                            "| `{intent}` | {} | {} | {} |",
                            spec.description,
                            aliases.join(", "),
                            dispatcher.registry().contains(intent.mode())
                        );
                    }
                }
                OutputFormat::Csv => {
                    let records = taxonomy.specs().map(|(intent, spec)| {
                        vec![intent.to_string(), spec.description.clone()]
                    });
                    write_csv(io::stdout().lock(), &["intent", "description"], records)?;
                }
            }
            Ok(())
        }

        pub fn modes(&self, registry: &HandlerRegistry) -> Result<()> {
            let handlers: Vec<_> = registry
                .modes()
                .into_iter()
                .filter_map(|mode| registry.get(&mode))
                .collect();
            match self.format {
                OutputFormat::Json => {
                    let payload: Vec<_> = handlers
                        .iter()
                        .map(|handler| {
                            json!({
                                "mode": handler.mode(),
                                "resource": handler.resource(),
                                "source_label": handler.source_label(),
                                "keywords": handler.keywords(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    println!("| Mode | Resource | Source |");
                    println!("| --- | --- | --- |");
                    for handler in &handlers {
                        println!(
                            "| `{}` | `{}` | {} |",
                            handler.mode(),
                            handler.resource(),
                            handler.source_label()
                        );
                    }
                }
                OutputFormat::Csv => {
                    let records = handlers.iter().map(|handler| {
                        vec![
                            handler.mode().to_string(),
                            handler.resource().to_string(),
                            handler.source_label().to_string(),
                        ]
                    });
                    write_csv(
                        io::stdout().lock(),
                        &["mode", "resource", "source_label"],
                        records,
                    )?;
                }
            }
            Ok(())
        }

        pub fn rules(&self, rules: &[CompiledRule]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload: Vec<_> = rules
                        .iter()
                        .map(|compiled| {
                            json!({
                                "rule": compiled.rule(),
                                "intent": compiled.intent(),
                                "pattern": compiled.matcher().as_str(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    println!("| # | Rule | Intent | Priority | Source |");
                    println!("| ---: | --- | --- | ---: | --- |");
                    for (position, compiled) in rules.iter().enumerate() {
                        let rule = compiled.rule();
                        println!(
                            "| {} | `{}` | `{}` | {} | {} |",
                            position + 1,
                            rule.name,
                            compiled.intent(),
                            rule.priority,
                            source_name(rule.metadata.source)
                        );
                    }
                }
                OutputFormat::Csv => {
                    let records = rules.iter().enumerate().map(|(position, compiled)| {
                        let rule = compiled.rule();
                        vec![
                            (position + 1).to_string(),
                            rule.name.clone(),
                            compiled.intent().to_string(),
                            rule.priority.to_string(),
                            source_name(rule.metadata.source).to_string(),
                        ]
                    });
                    write_csv(
                        io::stdout().lock(),
                        &["position", "rule", "intent", "priority", "source"],
                        records,
                    )?;
                }
            }
            Ok(())
        }
    }

    fn source_name(source: report_router_core::rules::RuleSource) -> &'static str {
        match source {
            report_router_core::rules::RuleSource::Domain => "domain",
            report_router_core::rules::RuleSource::Generated => "generated",
        }
    }

    /// Writes a header record and `records` as newline-terminated CSV.
    fn write_csv<W: io::Write>(
        writer: W,
        header: &[&str],
        records: impl IntoIterator<Item = Vec<String>>,
    ) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        writer.write_record(header)?;
        for record in records {
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn csv_text(header: &[&str], records: Vec<Vec<String>>) -> String {
            let mut buffer = Vec::new();
            write_csv(&mut buffer, header, records).expect("csv written");
            String::from_utf8(buffer).expect("utf-8")
        }

        #[test]
        fn csv_listing_quotes_only_fields_that_need_it() {
            let text = csv_text(
                &["mode", "source_label"],
                vec![
                    vec!["tags".into(), "Records, tags".into()],
                    vec!["roles".into(), "say \"hi\"".into()],
                ],
            );
            assert_eq!(
                text,
                "mode,source_label\ntags,\"Records, tags\"\nroles,\"say \"\"hi\"\"\"\n"
            );
        }

        #[test]
        fn csv_listing_quotes_carriage_returns() {
            let text = csv_text(&["rule"], vec![vec!["late\rbus".into()]]);
            assert_eq!(text, "rule\n\"late\rbus\"\n");
        }

        #[test]
        fn csv_listing_with_no_records_keeps_the_header() {
            assert_eq!(csv_text(&["intent", "rule"], Vec::new()), "intent,rule\n");
        }
    }
}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    const TICK: Duration = Duration::from_millis(80);

    pub fn spinner(message_enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !message_enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(TICK);
        Some(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["report-router", "dispatch"]).is_err());
        assert!(Cli::try_parse_from([
            "report-router",
            "dispatch",
            "--text",
            "tags",
            "--mode",
            "tags"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["report-router", "--format", "csv", "dispatch", "--mode", "votes", "--skip", "5"])
            .expect("parses");
        assert_eq!(cli.format, OutputFormat::Csv);
        let Command::Dispatch(args) = cli.command else {
            panic!("expected dispatch");
        };
        let request = args.request().expect("request");
        assert_eq!(request.target, DispatchTarget::Mode("votes".into()));
        assert_eq!((request.skip, request.limit), (5, DEFAULT_LIMIT));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
