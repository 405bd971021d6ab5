use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use html_img_localize::{BaseUri, ImageLocalizer, LocalizerConfig, SaveTarget};

#[derive(Parser)]
#[command(
    name = "html-img-localize",
    version = env!("LOCALIZE_VERSION"),
    about = "Copy the images an HTML document references into a folder and rewrite the document"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Timeout for each remote image, in seconds
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,

    /// Largest accepted image, in bytes
    #[arg(long, global = true)]
    max_bytes: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Localize images and rewrite their references
    Save {
        /// Input HTML file (stdin when omitted)
        input: Option<PathBuf>,

        /// Working folder for the image copies
        #[arg(long)]
        folder: PathBuf,

        /// Base URI for relative sources (defaults to the input file's folder)
        #[arg(long)]
        base: Option<String>,

        /// Write `<placeholder>/<file>` instead of absolute file URLs
        #[arg(long)]
        placeholder: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the per-image report as JSON on stderr
        #[arg(long)]
        report: bool,
    },
    /// Replace the placeholder with the working folder's URL
    Load {
        input: Option<PathBuf>,

        #[arg(long)]
        folder: PathBuf,

        #[arg(long)]
        placeholder: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the images under the placeholder, one per line
    List {
        input: Option<PathBuf>,

        #[arg(long)]
        placeholder: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = LocalizerConfig {
        fetch_timeout: Duration::from_secs(cli.timeout),
        ..LocalizerConfig::default()
    };
    if let Some(max) = cli.max_bytes {
        config.max_image_bytes = max;
    }

    match cli.command {
        Command::Save {
            input,
            folder,
            base,
            placeholder,
            output,
            report,
        } => {
            let html = read_input(input.as_deref())?;
            let base = match (base, &input) {
                (Some(uri), _) => BaseUri::parse(&uri)?,
                (None, Some(file)) => {
                    let dir = file
                        .canonicalize()
                        .with_context(|| format!("cannot resolve '{}'", file.display()))?
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    BaseUri::from_directory(&dir)?
                }
                (None, None) => BaseUri::Blank,
            };

            let mut localizer = ImageLocalizer::new(config);
            let conversion = localizer.convert_for_save(
                &html,
                &base,
                SaveTarget {
                    folder: Some(&folder),
                    placeholder: placeholder.as_deref(),
                },
            )?;

            if report {
                let json = serde_json::to_string_pretty(&conversion.report)
                    .context("cannot serialize report")?;
                eprintln!("{json}");
            }
            for (reference, reason) in conversion.report.skipped() {
                eprintln!("skipped {}: {reason}", reference.source);
            }
            write_output(output.as_deref(), &conversion.html)
        }
        Command::Load {
            input,
            folder,
            placeholder,
            output,
        } => {
            let html = read_input(input.as_deref())?;
            let html = ImageLocalizer::convert_for_load(&html, &folder, &placeholder)?;
            write_output(output.as_deref(), &html)
        }
        Command::List { input, placeholder } => {
            let html = read_input(input.as_deref())?;
            let mut stdout = io::stdout().lock();
            for name in ImageLocalizer::list_contained_images(&html, &placeholder) {
                writeln!(stdout, "{name}")?;
            }
            Ok(())
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display())),
        None => {
            let mut html = String::new();
            io::stdin()
                .read_to_string(&mut html)
                .context("cannot read stdin")?;
            Ok(html)
        }
    }
}

fn write_output(path: Option<&Path>, html: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, html).with_context(|| format!("cannot write '{}'", path.display()))
        }
        None => {
            io::stdout().write_all(html.as_bytes())?;
            Ok(())
        }
    }
}
