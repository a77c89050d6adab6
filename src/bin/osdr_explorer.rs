use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use osdr_explorer::app::{ActionResponse, App, ProgressSink};
use osdr_explorer::config::{ConfigLoader, ResolvedConfig};
use osdr_explorer::domain::{Accession, FILTER_CATEGORIES, FilterState, SearchRequest};
use osdr_explorer::error::OsdrError;
use osdr_explorer::insight::GeminiInsightEngine;
use osdr_explorer::osdr::OsdrHttpClient;
use osdr_explorer::output::{JsonOutput, OutputMode, StderrProgress, TextOutput};
use osdr_explorer::session::{ChatRole, ChatSession, Selection};

type HttpApp = App<OsdrHttpClient, GeminiInsightEngine>;

#[derive(Parser)]
#[command(name = "osdr-explorer")]
#[command(about = "Ask questions about NASA's Open Science Data Repository and explore its studies")]
#[command(version, author)]
struct Cli {
    /// Print JSON envelopes instead of text and progress.
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search studies with optional filters")]
    Search(SearchArgs),
    #[command(about = "Ask a question and list the studies that back the answer")]
    Ask(AskArgs),
    #[command(about = "Show metadata, files and an AI summary for one study")]
    Details(DetailsArgs),
    #[command(about = "Answer a question from OSDR data you supply")]
    Answer(AnswerArgs),
    #[command(about = "Interactive chat: ask questions and open studies")]
    Chat,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(default_value = "")]
    term: String,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long)]
    page_size: Option<u32>,

    /// Category keyword filter; repeat for several.
    #[arg(long = "category", value_parser = clap::builder::PossibleValuesParser::new(FILTER_CATEGORIES))]
    categories: Vec<String>,

    #[arg(long)]
    year_from: Option<i32>,

    #[arg(long)]
    year_to: Option<i32>,
}

#[derive(Args)]
struct AskArgs {
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
}

#[derive(Args)]
struct DetailsArgs {
    accession: String,
}

#[derive(Args)]
struct AnswerArgs {
    question: String,

    #[arg(long, conflicts_with = "data_file", required_unless_present = "data_file")]
    data: Option<String>,

    #[arg(long)]
    data_file: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<OsdrError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OsdrError) -> u8 {
    match error {
        OsdrError::InvalidAccession(_)
        | OsdrError::ConfigRead(_)
        | OsdrError::ConfigParse(_)
        | OsdrError::InvalidTransport(_)
        | OsdrError::MissingApiKey => 2,
        err if err.is_upstream() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = build_app(&config)?;

    match cli.command {
        Commands::Search(args) => run_search(&app, &config, args, output_mode),
        Commands::Ask(args) => run_ask(&app, args, output_mode),
        Commands::Details(args) => run_details(&app, args, output_mode),
        Commands::Answer(args) => run_answer(&app, args, output_mode),
        Commands::Chat => run_chat(app),
    }
}

fn build_app(config: &ResolvedConfig) -> Result<HttpApp, OsdrError> {
    let osdr = OsdrHttpClient::new(config.osdr.clone())?;
    let insight = GeminiInsightEngine::new(config.insight.clone())?;
    Ok(App::new(osdr, insight))
}

fn sink_for(mode: OutputMode) -> &'static dyn ProgressSink {
    match mode {
        OutputMode::Interactive => &StderrProgress,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

/// Prints a command result: the JSON envelope in non-interactive mode, the
/// text rendering otherwise. Failures still propagate for the exit code.
fn emit<T, F>(
    action: &str,
    result: Result<T, OsdrError>,
    mode: OutputMode,
    render: F,
) -> miette::Result<()>
where
    T: Serialize,
    F: FnOnce(&mut io::StdoutLock<'_>, &T) -> io::Result<()>,
{
    match (mode, result) {
        (OutputMode::NonInteractive, Ok(data)) => {
            JsonOutput::print(&ActionResponse::from_result(action, Ok(data))).into_diagnostic()
        }
        (OutputMode::NonInteractive, Err(err)) => {
            JsonOutput::print(&ActionResponse::<()> {
                success: false,
                data: None,
                error: Some(err.to_string()),
            })
            .into_diagnostic()?;
            Err(err.into())
        }
        (OutputMode::Interactive, Ok(data)) => {
            let mut stdout = io::stdout().lock();
            render(&mut stdout, &data).into_diagnostic()
        }
        (OutputMode::Interactive, Err(err)) => Err(err.into()),
    }
}

fn run_search(
    app: &HttpApp,
    config: &ResolvedConfig,
    args: SearchArgs,
    mode: OutputMode,
) -> miette::Result<()> {
    let page_size = args
        .page_size
        .filter(|size| *size > 0)
        .unwrap_or(config.search.page_size);
    let request = SearchRequest {
        term: args.term,
        page: args.page.max(1),
        page_size,
        filters: FilterState {
            categories: args.categories.into_iter().collect::<BTreeSet<_>>(),
            year_from: args.year_from,
            year_to: args.year_to,
        },
    };
    let result = app.search_studies(&request, sink_for(mode));
    emit("search_studies", result, mode, |out, page| {
        TextOutput::render_search(out, page, request.page, request.page_size)
    })
}

fn run_ask(app: &HttpApp, args: AskArgs, mode: OutputMode) -> miette::Result<()> {
    let question = args.question.join(" ");
    let result = app.ask_question(&question, sink_for(mode));
    emit("ask_question", result, mode, |out, insight| {
        TextOutput::render_insight(out, insight)
    })
}

fn run_details(app: &HttpApp, args: DetailsArgs, mode: OutputMode) -> miette::Result<()> {
    let result = args
        .accession
        .parse::<Accession>()
        .and_then(|accession| app.study_details(&accession, sink_for(mode)));
    emit("get_study_details", result, mode, |out, details| {
        TextOutput::render_details(out, details)
    })
}

fn run_answer(app: &HttpApp, args: AnswerArgs, mode: OutputMode) -> miette::Result<()> {
    let relevant_data = match (args.data, args.data_file) {
        (Some(data), _) => data,
        (None, Some(path)) => std::fs::read_to_string(&path).into_diagnostic()?,
        (None, None) => return Err(miette::Report::msg("--data or --data-file is required")),
    };
    let result = app.answer_with_context(&args.question, &relevant_data, sink_for(mode));
    emit("answer_with_context", result, mode, |out, answer| {
        writeln!(out, "{answer}")
    })
}

fn run_chat(app: HttpApp) -> miette::Result<()> {
    let mut session = ChatSession::new(app);
    let sink = StderrProgress;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    if let Some(welcome) = session.messages().first() {
        writeln!(stdout, "{}", welcome.content).into_diagnostic()?;
    }
    writeln!(
        stdout,
        "Commands: `open <accession>`, `studies`, `quit`. Anything else is a question."
    )
    .into_diagnostic()?;

    loop {
        write!(stdout, "> ").into_diagnostic()?;
        stdout.flush().into_diagnostic()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).into_diagnostic()? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "studies" => {
                for study in session.studies() {
                    TextOutput::render_study(&mut stdout, study).into_diagnostic()?;
                }
            }
            _ => {
                if let Some(target) = input.strip_prefix("open ") {
                    let accession = match target.parse::<Accession>() {
                        Ok(accession) => accession,
                        Err(err) => {
                            writeln!(stdout, "{err}").into_diagnostic()?;
                            continue;
                        }
                    };
                    match session.select_study(&accession, &sink) {
                        Selection::Loaded(details) => {
                            TextOutput::render_details(&mut stdout, &details).into_diagnostic()?
                        }
                        Selection::Cleared => {
                            writeln!(stdout, "Closed {accession}.").into_diagnostic()?
                        }
                        Selection::Failed(message) => {
                            writeln!(stdout, "Error fetching details: {message}")
                                .into_diagnostic()?
                        }
                    }
                    continue;
                }

                let response = session.send(input, &sink);
                if let Some(reply) = session
                    .messages()
                    .last()
                    .filter(|message| message.role == ChatRole::Assistant)
                {
                    writeln!(stdout, "\n{}\n", reply.content).into_diagnostic()?;
                }
                if let Some(insight) = response.data {
                    writeln!(stdout, "{} related studies (type `studies`).", insight.studies.len())
                        .into_diagnostic()?;
                }
            }
        }
    }
    Ok(())
}
