use clap::{Parser, Subcommand};
use notes_shelf::config::{self, ShelfConfig};
use notes_shelf::library::{
    ActionResponse, MaterialLibrary, PdfUpload, RemovalRequest, UploadRequest,
};
use notes_shelf::output;
use notes_shelf::thumbnail::ThumbnailFormat;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "notes-shelf")]
#[command(about = "Catalog, storage and thumbnails for uploaded PDF study notes")]
#[command(long_about = "\
Catalog, storage and thumbnails for uploaded PDF study notes

PDFs are filed by semester, branch, and subject. Each upload gets a
first-page thumbnail and a record in a JSON catalog the front end reads.

Site layout (defaults, all configurable):

  <root>/
  ├── config.toml                      # Optional, see 'notes-shelf gen-config'
  └── data/
      ├── notes-data.json              # Catalog: semesters → branches → subjects → materials
      ├── notes/
      │   └── semester-1/cse/data-structures/
      │       └── Unit_1.pdf           # Uploaded PDF (sanitized file name)
      └── thumbnails/
          └── 3f1c…9ab2.png            # sha256(storage path) + extension

Thumbnails are rendered with poppler's pdftoppm. Without it uploads still
succeed; the thumbnail is rendered on first request once it is installed.

Logs go to stderr (RUST_LOG or -v/-vv to adjust); results go to stdout.")]
#[command(version)]
struct Cli {
    /// Site root: the directory the catalog and storage paths are relative to
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Subject a material belongs to.
#[derive(clap::Args, Clone)]
struct SubjectArgs {
    /// Semester id
    #[arg(long)]
    semester: String,
    /// Branch id
    #[arg(long)]
    branch: String,
    /// Subject id
    #[arg(long)]
    subject: String,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PDF and record it under a subject
    Add {
        #[command(flatten)]
        target: SubjectArgs,
        /// Material title
        #[arg(long)]
        title: String,
        /// Material description
        #[arg(long)]
        description: String,
        /// Store under this file name instead of the PDF's own
        #[arg(long)]
        name: Option<String>,
        /// PDF file to upload
        pdf: PathBuf,
    },
    /// Delete a material, its PDF, and its thumbnails
    Remove {
        #[command(flatten)]
        target: SubjectArgs,
        /// Storage path of the material, e.g. /data/notes/semester-1/cse/os/x.pdf
        #[arg(long)]
        path: String,
    },
    /// Print the thumbnail file for a PDF, rendering it if missing
    Thumbnail {
        /// Storage path of the PDF
        #[arg(long)]
        path: String,
        /// png or webp (unknown values fall back to png)
        #[arg(long)]
        format: Option<String>,
    },
    /// Render thumbnails for every material in the catalog
    Regenerate {
        /// Output format (defaults to thumbnails.format)
        #[arg(long)]
        format: Option<ThumbnailFormat>,
        /// Re-render thumbnails that already exist
        #[arg(long)]
        force: bool,
    },
    /// Delete thumbnails no catalog material refers to
    Prune,
    /// Print the file a download request for a storage path would serve
    Download {
        /// Storage path of the PDF
        #[arg(long)]
        path: String,
    },
    /// Show the catalog tree
    List {
        /// Print the raw catalog JSON instead of the tree
        #[arg(long)]
        json: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // gen-config must work even when the existing config.toml is broken
    let shelf_config = match cli.command {
        Command::GenConfig => ShelfConfig::default(),
        _ => config::load_config(&cli.root)?,
    };
    debug!(root = %cli.root.display(), "config loaded");
    let library = MaterialLibrary::from_config(&cli.root, &shelf_config);

    let response = match cli.command {
        Command::Add {
            target,
            title,
            description,
            name,
            pdf,
        } => library.upload(UploadRequest {
            semester: target.semester,
            branch: target.branch,
            subject: target.subject,
            title,
            description,
            pdf: Some(read_upload(&pdf, name)?),
        }),
        Command::Remove { target, path } => library.delete(&RemovalRequest {
            semester: target.semester,
            branch: target.branch,
            subject: target.subject,
            path,
        }),
        Command::Thumbnail { path, format } => {
            match library.ensure_thumbnail(&path, format.as_deref()) {
                Ok(file) => {
                    println!("{}", file.display());
                    return Ok(ExitCode::SUCCESS);
                }
                Err(e) => ActionResponse::from(&e),
            }
        }
        Command::Regenerate { format, force } => {
            init_thread_pool(&shelf_config);
            let stats = library.regenerate_thumbnails(format, force)?;
            println!("{}", output::format_regenerate(&stats));
            return Ok(exit_code(stats.failed == 0));
        }
        Command::Prune => {
            let removed = library.prune_thumbnails()?;
            for line in output::format_pruned(&removed) {
                println!("{}", line);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::Download { path } => match library.resolve_download(&path) {
            Ok(file) => {
                println!("{}", file.display());
                return Ok(ExitCode::SUCCESS);
            }
            Err(e) => ActionResponse::from(&e),
        },
        Command::List { json } => {
            let catalog = library.catalog()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                output::print_catalog(&catalog);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(ExitCode::SUCCESS);
        }
    };

    output::print_response(&response);
    Ok(exit_code(response.success))
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(shelf_config: &ShelfConfig) {
    let threads = config::effective_threads(&shelf_config.processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn read_upload(pdf: &Path, name: Option<String>) -> std::io::Result<PdfUpload> {
    let file_name = name.unwrap_or_else(|| {
        pdf.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    Ok(PdfUpload {
        file_name,
        bytes: std::fs::read(pdf)?,
    })
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
