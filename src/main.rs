use clap::{Parser, Subcommand};
use core_types::{HighlightColor, HighlightId};
use highlight::{DeleteTarget, EngineConfig, SpanCandidate};
use html::dom_snapshot::to_html;
use html::{StructuralPath, parse_document, resolve_structural_path};
use page::Page;
use runtime_store::{JsonFileBackend, MemoryBackend, StoreEvent, start_store_runtime};
use std::error::Error;
use std::fs;
use std::future::ready;
use std::path::PathBuf;
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "marker")]
#[command(about = "Persistent text highlights for markup documents", long_about = None)]
struct Args {
    /// JSON store file (default: in-memory, nothing is kept)
    #[arg(short = 's', long = "store", value_name = "FILE")]
    store: Option<PathBuf>,

    /// TOML engine configuration
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Markup file to open
    html: PathBuf,

    /// Address the document is stored under
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Restore stored highlights and print the markup
    Show,
    /// Print the stored highlights as JSON
    List,
    /// Highlight a span of one container's text
    Add {
        /// Structural path of the container, e.g. `#post>p:nth-of-type(2)`
        #[arg(long)]
        container: String,
        #[arg(long)]
        start: usize,
        #[arg(long)]
        end: usize,
        /// Palette name or any CSS color
        #[arg(long, default_value = "yellow")]
        color: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Remove a highlight by id
    Remove { id: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let config: EngineConfig = toml::from_str(&fs::read_to_string(path)?)?;
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.config.as_ref())?;
    let document = parse_document(&fs::read_to_string(&args.html)?);
    let store = match &args.store {
        Some(path) => start_store_runtime(JsonFileBackend::new(path)),
        None => start_store_runtime(MemoryBackend::new()),
    };

    let mut page = Page::open(document, config, &store, ready(args.url.clone()))?;
    for (id, err) in &page.restore_report().skipped {
        eprintln!("skipped {id}: {err}");
    }

    match args.command {
        Commands::Show => println!("{}", to_html(page.document())),
        Commands::List => {
            println!("{}", serde_json::to_string_pretty(&page.engine().descriptors())?);
        }
        Commands::Add {
            container,
            start,
            end,
            color,
            category,
        } => {
            let path = StructuralPath::parse(&container)?;
            let options = page.engine().config().path_options();
            let container = resolve_structural_path(page.document(), &path, &options)?;
            let color = HighlightColor::from_name(&color)
                .map(|c| c.css().to_string())
                .unwrap_or(color);
            let outcome = page.highlight_span(
                SpanCandidate {
                    container,
                    start,
                    end,
                },
                &color,
                category.as_deref(),
            )?;
            for id in &outcome.absorbed {
                eprintln!("merged {id}");
            }
            for id in &outcome.inserted {
                eprintln!("added {id}");
            }
            println!("{}", to_html(page.document()));
        }
        Commands::Remove { id } => {
            page.remove(DeleteTarget::Id(HighlightId::new(id)))?;
            println!("{}", to_html(page.document()));
        }
    }
    drop(page);

    store.flush()?;
    for event in store.drain_events() {
        if let StoreEvent::Failed { error, .. } = event {
            return Err(error.into());
        }
    }
    store.shutdown()?;
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
