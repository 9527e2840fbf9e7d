use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use dialoguer::{Input, Password};
use memey_config::{ConfigError, Credentials};
use memey_imgflip::{CaptionMode, ImgflipError, alternating_case, caption_image, fetch_templates};
use memey_templates::{
    ExpressionTable, Resolution, ResolvedCaption, Template, TemplateError, TemplateStore, resolve,
};
use thiserror::Error;
use tracing::debug;

/// Memey CLI entry point.
///
/// Matches a short phrase or an explicit search query against the local
/// template catalog and asks Imgflip to caption the chosen template.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "memey",
    author,
    version,
    about = "Make memes from your terminal.",
    disable_version_flag = true,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    create: CreateArgs,

    /// Show version number
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Verbose tracing to standard output
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// (Optional/default) creates a meme
    Create(CreateArgs),
    /// Updates the local template catalog from Imgflip
    Update,
    /// Login to Imgflip
    Login,
    /// Show meme stats
    Stats,
}

#[derive(Args, Debug, Clone, Default)]
struct CreateArgs {
    /// Shorthand phrase, e.g. "y u no work"
    #[arg(value_name = "PHRASE")]
    phrase: Option<String>,

    /// Selects a meme by name
    #[arg(short = 's', long = "search", value_name = "QUERY")]
    search: Option<String>,

    /// Input top text
    #[arg(short = 't', long = "top", value_name = "TEXT")]
    top: Option<String>,

    /// Input bottom text
    #[arg(short = 'b', long = "bottom", value_name = "TEXT")]
    bottom: Option<String>,

    /// Apply the alternating-case transform to the caption text
    #[arg(short = 'a', long = "alternating-case")]
    alternating_case: bool,

    /// Open the finished meme in the browser
    #[arg(short = 'o', long = "open")]
    open: bool,

    /// Download the finished meme and open the local copy
    #[arg(short = 'l', long = "open-locally")]
    open_locally: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("You need to log in first. Run \"memey login\" and provide your Imgflip credentials.")]
    NotLoggedIn,
    #[error("An input is required.")]
    NoInput,
    #[error("No memes found.")]
    NoQueryMatch,
    #[error("Meme not found.")]
    NoPhraseMatch,
    #[error(transparent)]
    Imgflip(#[from] ImgflipError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Templates(#[from] TemplateError),
    #[error("failed to read login input: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// A fully resolved caption request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CaptionJob {
    template_id: u64,
    top: Option<String>,
    bottom: Option<String>,
    mode: CaptionMode,
}

/// What the create flow decided to do, before any network traffic.
#[derive(Debug)]
enum CreatePlan {
    Caption(CaptionJob),
    List(Vec<String>),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stdout)
            .init();
        debug!("debugging enabled");
    }

    let result = match cli.command {
        Some(Command::Create(args)) => run_create(&args),
        Some(Command::Update) => run_update(),
        Some(Command::Login) => run_login(),
        Some(Command::Stats) => run_stats(),
        None => run_create(&cli.create),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            println!("{error}");
            ExitCode::FAILURE
        }
    }
}

/// The enumerated set of inputs that make a create invocation meaningful.
fn has_input(args: &CreateArgs) -> bool {
    args.phrase.is_some() || args.search.is_some() || args.top.is_some() || args.bottom.is_some()
}

fn caption_job(resolved: ResolvedCaption, alternate: bool) -> CaptionJob {
    if alternate {
        // The simple endpoint re-capitalizes text server side, which would
        // destroy the transform; boxes mode preserves exact casing.
        CaptionJob {
            template_id: resolved.template_id,
            top: resolved.top.as_deref().map(alternating_case),
            bottom: resolved.bottom.as_deref().map(alternating_case),
            mode: CaptionMode::Boxes,
        }
    } else {
        CaptionJob {
            template_id: resolved.template_id,
            top: resolved.top,
            bottom: resolved.bottom,
            mode: CaptionMode::Simple,
        }
    }
}

fn plan_create(
    args: &CreateArgs,
    store: &TemplateStore,
    table: &ExpressionTable,
) -> Result<CreatePlan, CliError> {
    let resolution = resolve(
        store,
        table,
        args.phrase.as_deref(),
        args.search.as_deref(),
        args.top.as_deref(),
        args.bottom.as_deref(),
    );

    match resolution {
        Resolution::Matched(resolved) => {
            Ok(CreatePlan::Caption(caption_job(resolved, args.alternating_case)))
        }
        Resolution::Candidates(candidates) => Ok(CreatePlan::List(
            candidates
                .iter()
                .map(|template| format!("{} - {}", template.name, template.url))
                .collect(),
        )),
        Resolution::NoMatch => Err(if args.search.is_some() {
            CliError::NoQueryMatch
        } else {
            CliError::NoPhraseMatch
        }),
    }
}

fn run_create(args: &CreateArgs) -> Result<(), CliError> {
    debug!("parsing input");

    let credentials = Credentials::load();
    if !credentials.is_logged_in() {
        return Err(CliError::NotLoggedIn);
    }
    if !has_input(args) {
        return Err(CliError::NoInput);
    }

    let store = TemplateStore::load_or_builtin(&memey_config::templates_file_path()?);
    let table = ExpressionTable::builtin();

    match plan_create(args, &store, &table)? {
        CreatePlan::List(lines) => {
            for line in lines {
                println!("{line}");
            }
            Ok(())
        }
        CreatePlan::Caption(job) => execute_caption(&credentials, &job, args),
    }
}

fn execute_caption(
    credentials: &Credentials,
    job: &CaptionJob,
    args: &CreateArgs,
) -> Result<(), CliError> {
    let image = caption_image(
        credentials.username.as_deref().unwrap_or_default(),
        credentials.password.as_deref().unwrap_or_default(),
        job.template_id,
        job.top.as_deref(),
        job.bottom.as_deref(),
        job.mode,
    )?;

    println!("{}", image.url);
    copy_to_clipboard(&image.url);

    if args.open {
        if let Err(error) = open::that(&image.url) {
            eprintln!("Warning: failed to open the browser ({error}).");
        }
    }

    if args.open_locally {
        match memey_image::download_image(&image.url, None) {
            Ok(path) => {
                if let Err(error) = open::that(&path) {
                    eprintln!("Warning: failed to open {} ({error}).", path.display());
                }
            }
            Err(error) => eprintln!("Download Failed: {error}"),
        }
    }

    Ok(())
}

fn copy_to_clipboard(url: &str) {
    let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(url));
    if let Err(error) = copied {
        eprintln!("Warning: could not copy the URL to the clipboard ({error}).");
    }
}

fn run_update() -> Result<(), CliError> {
    let path = memey_config::templates_file_path()?;
    let mut store = TemplateStore::load_or_builtin(&path);

    let remote = fetch_templates()?;
    let added = store.merge(remote.into_iter().map(|template| Template {
        id: template.id,
        name: template.name,
        url: template.url,
    }));

    for name in &added {
        println!("Added: {name}");
    }
    store.save(&path)?;

    if added.is_empty() {
        println!("Already up-to-date.");
    } else {
        println!("Updated!");
    }
    Ok(())
}

fn run_login() -> Result<(), CliError> {
    let username: String = Input::new()
        .with_prompt("username")
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("username is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    let password = Password::new()
        .with_prompt("password")
        .allow_empty_password(true)
        .interact()?;

    let credentials = Credentials {
        username: Some(username),
        password: Some(password),
    };
    let path = credentials.save()?;
    debug!("credentials written to {}", path.display());
    Ok(())
}

fn run_stats() -> Result<(), CliError> {
    let store = TemplateStore::load_or_builtin(&memey_config::templates_file_path()?);
    let table = ExpressionTable::builtin();

    println!("Saved Memes: {}", store.len());
    println!("Known Expressions: {}", table.len());
    Ok(())
}

#[cfg(test)]
mod tests;
