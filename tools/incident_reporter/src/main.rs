use clap::Parser;
use incident_report_core::config::ReporterConfig;
use incident_report_core::error::CoreResult;
use incident_report_core::incident::workflow::{execute_report_workflow, prepare_prompt, ReportJob};
use incident_report_core::llm::chat::ChatCompletionsClient;
use incident_report_core::slack::client::SlackWebClient;
use incident_report_core::slack::thread_ref::parse_thread_ref;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "incident_reporter",
    version,
    about = "Turn a Slack incident thread into HTML and Markdown reports"
)]
struct Cli {
    /// Thread root: permalink token (p1737558645123456), Slack ts, or permalink URL
    thread: String,

    /// Directory for the generated reports (overrides REPORTS_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Channel holding the thread (overrides SLACK_CHANNEL_ID)
    #[arg(long)]
    channel: Option<String>,

    /// Print the extraction prompt and stop before calling the model
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> CoreResult<()> {
    let thread = parse_thread_ref(&cli.thread)?;

    let mut config = ReporterConfig::from_env()?;
    if let Some(dir) = cli.output_dir {
        config = config.with_reports_dir(dir);
    }
    if let Some(channel) = cli.channel {
        config = config.with_channel(channel);
    }

    let slack = SlackWebClient::from_settings(&config.slack, config.http_timeout);
    let job = ReportJob::from_config(&config, thread)?;

    if cli.dry_run {
        let prepared = prepare_prompt(job, &slack)?;
        println!("{}", prepared.prompt);
        return Ok(());
    }

    let llm = ChatCompletionsClient::from_settings(&config.inference, config.http_timeout);
    let output = execute_report_workflow(job, &slack, &llm)?;
    println!("{}", output.written.html_path.display());
    println!("{}", output.written.markdown_path.display());
    Ok(())
}

/// A missing `.env` is fine; a malformed or unreadable one is not.
fn dotenv_outcome(loaded: Result<PathBuf, dotenvy::Error>) -> Result<(), dotenvy::Error> {
    match loaded {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = dotenv_outcome(dotenvy::dotenv()) {
        eprintln!("error: failed to load .env: {}", e);
        std::process::exit(1);
    }
    init_tracing();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_dotenv_is_ignored() {
        let missing = Err(dotenvy::Error::Io(io::Error::from(ErrorKind::NotFound)));
        assert!(dotenv_outcome(missing).is_ok());
        assert!(dotenv_outcome(Ok(PathBuf::from(".env"))).is_ok());
    }

    #[test]
    fn test_malformed_dotenv_is_reported() {
        let malformed = Err(dotenvy::Error::LineParse("SLACK_BOT_TOKEN xoxb".to_string(), 15));
        assert!(matches!(
            dotenv_outcome(malformed),
            Err(dotenvy::Error::LineParse(_, 15))
        ));

        let unreadable = Err(dotenvy::Error::Io(io::Error::from(ErrorKind::PermissionDenied)));
        assert!(dotenv_outcome(unreadable).is_err());
    }
}
