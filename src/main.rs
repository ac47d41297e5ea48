use clap::Parser;
use duration::message::Action;
use duration::settings::{GLOBAL_SETTINGS_FILE, GlobalSettings, ProjectSettings};
use duration::{init, project};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SAMPLE_PROJECT: &str = "Sample Project";

/// Timeline editor driving visuals over OSC.
#[derive(Debug, Parser)]
#[command(name = "duration", version)]
struct Args {
    /// Directory holding projects and global settings
    #[arg(long)]
    projects_dir: Option<PathBuf>,
    /// Project to open: a name under the projects directory or an absolute path
    #[arg(long)]
    project: Option<PathBuf>,
    /// Override the OSC listen port
    #[arg(long)]
    in_port: Option<u16>,
    /// Override the OSC destination port
    #[arg(long)]
    out_port: Option<u16>,
    /// Override the OSC destination address
    #[arg(long)]
    ip: Option<String>,
}

fn default_projects_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Duration")
}

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let projects_dir = args.projects_dir.unwrap_or_else(default_projects_dir);
    std::fs::create_dir_all(&projects_dir)?;

    let settings_path = projects_dir.join(GLOBAL_SETTINGS_FILE);
    let global = match GlobalSettings::load(&settings_path) {
        Ok(global) => global,
        Err(e) => {
            if settings_path.exists() {
                warn!("Global settings unreadable, using defaults: {e}");
            }
            GlobalSettings::default()
        }
    };

    let project = args
        .project
        .or_else(|| global.last_project_path.clone())
        .unwrap_or_else(|| PathBuf::from(SAMPLE_PROJECT));
    let project_dir = if project.is_absolute() {
        project
    } else {
        projects_dir.join(&project)
    };
    if !project::exists(&project_dir) {
        let name = project_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| SAMPLE_PROJECT.to_string());
        project::create(&project_dir, &name)?;
        info!("Created project {}", project_dir.display());
    }

    let (client, handle) = init(projects_dir.clone(), ProjectSettings::default())
        .await
        .map_err(io::Error::other)?;
    client.open(project_dir.clone()).await;

    if let Some(port) = args.in_port {
        client.request(Action::SetOscInPort(port)).await;
    }
    if let Some(port) = args.out_port {
        client.request(Action::SetOscOutPort(port)).await;
    }
    if let Some(ip) = args.ip {
        client.request(Action::SetOscIp(ip)).await;
    }

    info!("Duration running, press ctrl-c to quit");
    tokio::signal::ctrl_c().await?;
    client.quit().await;
    if let Err(e) = handle.await {
        warn!("Controller task ended badly: {e}");
    }
    Ok(())
}
