// NativiWeb command line client.
// Lists resources, starts and watches builds, and downloads build artifacts.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use nativiweb::api::{ApiClient, Build, BuildType, NewBuild, Platform};
use nativiweb::app::App;
use nativiweb::auth::{NoSession, SessionProvider, StaticSession};
use nativiweb::cache::TtlCache;
use nativiweb::config::{ClientConfig, downloads_dir, log_file_path};
use nativiweb::error::{ApiError, Result};
use nativiweb::polling::{BuildPoller, PollConfig};
use nativiweb::telemetry::{self, TelemetryConfig};

/// NativiWeb - wrap web apps as native Android and iOS projects
#[derive(Parser)]
#[command(name = "nativiweb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List your projects
    Projects,

    /// List the builds of a project
    Builds {
        project_id: String,
    },

    /// Start a build and watch it
    Build {
        project_id: String,

        /// Target platform
        #[arg(short, long, value_enum)]
        platform: PlatformArg,

        /// Build a release instead of a debug artifact
        #[arg(long)]
        release: bool,
    },

    /// Watch a running build
    Watch {
        build_id: String,
    },

    /// Download a finished build
    Download {
        build_id: String,

        /// Directory to save into (defaults to the user data directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List your API keys
    Keys,

    /// Check that the backend has the native toolchains installed
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Android,
    Ios,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Android => Platform::Android,
            PlatformArg::Ios => Platform::Ios,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut telemetry_config = TelemetryConfig::from_env();
    telemetry_config.json |= cli.json_logs;
    // The monitor owns the terminal, so its logs go to a file
    if matches!(cli.command, Commands::Build { .. } | Commands::Watch { .. }) {
        if let Some(path) = log_file_path() {
            telemetry_config = telemetry_config.with_log_file(path);
        }
    }
    if let Err(e) = telemetry::init(&telemetry_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            if e.is_connection_error() {
                eprintln!("hint: set NATIVIWEB_API_URL or base_url in the config file");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load(cli.config.as_deref())?;

    let cache = TtlCache::with_default_ttl(config.cache_ttls().default);
    let _sweeper = cache.spawn_sweeper(config.sweep_interval());

    let session: Arc<dyn SessionProvider> = match StaticSession::from_env() {
        Some(session) => Arc::new(session),
        None => Arc::new(NoSession),
    };
    let client = ApiClient::new(&config, cache, session)?;

    match cli.command {
        Commands::Projects => {
            let projects = client.projects().list().await?;
            if projects.is_empty() {
                println!("No projects");
            }
            for project in projects {
                let platforms: Vec<&str> = project.platform.iter().map(Platform::display).collect();
                println!(
                    "{:<38} {:<24} {:<12} {}",
                    project.id,
                    project.name,
                    platforms.join(","),
                    project.web_url
                );
            }
        }
        Commands::Builds { project_id } => {
            let builds = client.builds().list_for_project(&project_id).await?;
            if builds.is_empty() {
                println!("No builds");
            }
            for build in builds {
                print_build(&build);
            }
        }
        Commands::Build {
            project_id,
            platform,
            release,
        } => {
            let new_build = NewBuild {
                project_id,
                platform: platform.into(),
                build_type: if release {
                    BuildType::Release
                } else {
                    BuildType::Debug
                },
            };
            let handle = BuildPoller::start_new(
                client.clone(),
                &new_build,
                PollConfig::from_client_config(&config),
            )
            .await?;
            monitor(App::new(handle)).await?;
        }
        Commands::Watch { build_id } => {
            let build = client.builds().get_fresh(&build_id).await?;
            let handle =
                BuildPoller::start(client.clone(), build, PollConfig::from_client_config(&config));
            monitor(App::new(handle)).await?;
        }
        Commands::Download { build_id, out } => {
            let dir = out
                .or_else(downloads_dir)
                .unwrap_or_else(|| PathBuf::from("."));

            let bar = download_bar();
            let file = client
                .builds()
                .download_with_progress(&build_id, |progress| {
                    if let Some(total) = progress.bytes_total {
                        bar.set_length(total);
                    }
                    bar.set_position(progress.bytes_received);
                })
                .await;
            bar.finish_and_clear();

            let file = file?;
            let path = file.save_to(&dir)?;
            println!("Saved {} ({} bytes)", path.display(), file.len());
        }
        Commands::Keys => {
            let keys = client.api_keys().list().await?;
            if keys.is_empty() {
                println!("No API keys");
            }
            for key in keys {
                println!(
                    "{:<38} {:<24} {}",
                    key.id,
                    key.name,
                    key.key_preview.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Check => {
            let report = client.system().check_dependencies().await?;
            for dep in &report.dependencies {
                println!(
                    "{} {:<20} {}",
                    if dep.installed { "✅" } else { "❌" },
                    dep.name,
                    dep.version.as_deref().unwrap_or("")
                );
            }
            if !report.ready {
                return Err(ApiError::Other(
                    "backend is missing required build dependencies".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Run the terminal monitor until the user quits.
async fn monitor(mut app: App) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal).await;
    ratatui::restore();
    result?;

    let build = &app.state.build;
    println!(
        "{} build {}: {} ({}%)",
        build.platform.display(),
        build.id,
        build.status.display(),
        build.progress
    );
    Ok(())
}

fn print_build(build: &Build) {
    println!(
        "{:<38} {:<8} {:<11} {:>3}% {}",
        build.id,
        build.platform.display(),
        build.status.display(),
        build.progress,
        build.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn download_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message("downloading");
    bar
}
