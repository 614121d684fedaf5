use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use studio_gallery::auth::{AuthError, AuthProvider, LocalAuth, require_owner};
use studio_gallery::compress::Compressor;
use studio_gallery::config::{self, StudioConfig};
use studio_gallery::gallery::{DeletePolicy, GalleryError, GalleryRecords, NewGallery, compose_client_email};
use studio_gallery::intake::{self, Limits};
use studio_gallery::naming::gallery_link;
use studio_gallery::output;
use studio_gallery::render::write_gallery_page;
use studio_gallery::store::fs::{FsDocumentStore, FsObjectStore};
use studio_gallery::telemetry::{SharedTelemetry, TracingTelemetry};
use studio_gallery::types::GallerySummary;
use studio_gallery::upload::{UploadBatcher, UploadSession};
use studio_gallery::viewer::GalleryViewer;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "studio-gallery")]
#[command(about = "Client photo galleries for a photography studio")]
#[command(long_about = "\
Client photo galleries for a photography studio

Create a gallery for a client, compress and upload a selection of photos in
parallel batches, then send the client a link to view and download them.

Data directory layout:

  studio-data/
  ├── studio.toml                  # Config (optional, see gen-config)
  ├── .url-secret                  # Signing key for time-limited image URLs
  ├── galleries/
  │   └── <gallery-id>.json        # Gallery record with its image list
  └── objects/
      └── galleries/<gallery-id>/  # Uploaded image files

Admin commands (create, list, delete, email) require the owner password
when auth.password_sha256 is set in studio.toml. Pass it with --password
or the STUDIO_GALLERY_PASSWORD environment variable.

Log verbosity follows RUST_LOG (default: info).

Run 'studio-gallery gen-config' to generate a documented studio.toml.")]
#[command(version)]
struct Cli {
    /// Data directory holding config, records, and uploaded objects
    #[arg(long, default_value = "studio-data", global = true)]
    data: PathBuf,

    /// Owner password for admin commands
    #[arg(long, env = "STUDIO_GALLERY_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a gallery and upload images into it
    Create {
        /// Gallery name shown to the client
        #[arg(long)]
        name: String,
        /// Client's name
        #[arg(long)]
        client: String,
        /// Client's email address
        #[arg(long)]
        email: String,
        /// Extra attempts for items that failed to upload or record
        #[arg(long, default_value_t = 1)]
        retries: usize,
        /// Image files or directories of images
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show a gallery as the client sees it
    View {
        gallery_id: String,
        /// Also write the client page to this HTML file
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// List galleries, newest first
    List {
        /// Case-insensitive filter on gallery name, client name, or email
        #[arg(long)]
        search: Option<String>,
    },
    /// Delete a gallery record
    Delete {
        gallery_id: String,
        /// Also delete the gallery's uploaded images
        #[arg(long)]
        purge: bool,
    },
    /// Print the "gallery ready" email for a client
    Email { gallery_id: String },
    /// Print a stock studio.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.data)?;
    init_thread_pool(&config.processing);
    let telemetry: SharedTelemetry = Arc::new(TracingTelemetry);
    let objects = Arc::new(FsObjectStore::open(&cli.data).await?);
    let docs = Arc::new(FsDocumentStore::open(&cli.data).await?);
    let records = Arc::new(GalleryRecords::new(docs.clone(), telemetry.clone()));

    match cli.command {
        Command::Create {
            name,
            client,
            email,
            retries,
            paths,
        } => {
            sign_in_owner(&config, cli.password.as_deref()).await?;
            let gallery = NewGallery::new(name, client, email);
            gallery.validate()?;

            println!("==> Selecting images");
            let mut session = UploadSession::new(Limits::from(&config.upload));
            let rejected = session.select(intake::read_candidates(&paths)?).await?;
            output::print_lines(&output::format_admission(
                session.items().len(),
                session.total_size(),
                session.limit_usage(),
                &rejected,
            ));
            if session.items().is_empty() {
                return Err("no images to upload".into());
            }

            println!("==> Compressing");
            let compressor = Arc::new(Compressor::from_config(&config.compression, telemetry.clone()));
            session.compress(compressor).await?;
            output::print_lines(&output::format_compression(session.items()));

            let gallery_id = session.create_gallery(&records, &gallery).await?;
            let link = gallery_link(&config.site.base_url, &gallery_id);
            println!("==> Uploading to gallery {gallery_id}");

            let mut attempt = 0;
            let report = loop {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let printer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        output::print_lines(&output::format_upload_event(&event));
                    }
                });
                let batcher = UploadBatcher::new(
                    objects.clone(),
                    records.clone(),
                    config.upload.batch_size,
                    telemetry.clone(),
                )
                .with_events(tx);
                let report = session.upload(&batcher).await?;
                drop(batcher);
                printer.await?;

                if report.is_complete() || attempt >= retries {
                    break report;
                }
                attempt += 1;
                println!("==> Retrying unfinished items (attempt {attempt} of {retries})");
            };

            output::print_lines(&output::format_upload_report(&report, &link));
            if !report.is_complete() {
                return Err(format!("gallery {gallery_id} is incomplete").into());
            }
        }
        Command::View { gallery_id, html } => {
            let viewer = GalleryViewer::new(docs, objects, &config.viewer);
            let view = viewer.view_gallery(&gallery_id).await;
            output::print_lines(&output::format_view(&view));
            if let Some(path) = html {
                write_gallery_page(&view, &config.site.studio_name, &path)?;
                println!("Wrote {}", path.display());
            }
        }
        Command::List { search } => {
            sign_in_owner(&config, cli.password.as_deref()).await?;
            let galleries = records.list_galleries(search.as_deref()).await?;
            output::print_lines(&output::format_gallery_list(&galleries));
        }
        Command::Delete { gallery_id, purge } => {
            sign_in_owner(&config, cli.password.as_deref()).await?;
            let policy = if purge {
                DeletePolicy::WithObjects
            } else {
                DeletePolicy::RecordOnly
            };
            let report = records.delete_gallery(&gallery_id, policy, objects.as_ref()).await?;
            output::print_lines(&output::format_delete(&gallery_id, &report));
        }
        Command::Email { gallery_id } => {
            sign_in_owner(&config, cli.password.as_deref()).await?;
            let record = records
                .get(&gallery_id)
                .await?
                .ok_or_else(|| GalleryError::NotFound(gallery_id.clone()))?;
            let email = compose_client_email(
                &GallerySummary::from(&record),
                &config.site.base_url,
                &config.site.studio_name,
            );
            output::print_lines(&output::format_email(&email));
        }
        Command::GenConfig => {} // printed above
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays pipeable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Sign the owner in when a password hash is configured.
///
/// With no hash in `studio.toml` admin access is open.
async fn sign_in_owner(config: &StudioConfig, password: Option<&str>) -> Result<(), AuthError> {
    let auth = LocalAuth::from_config(&config.auth);
    if !auth.requires_password() {
        return Ok(());
    }
    let password = password.ok_or(AuthError::NotSignedIn)?;
    auth.sign_in(auth.owner_email(), password).await?;
    require_owner(&auth)?;
    Ok(())
}
