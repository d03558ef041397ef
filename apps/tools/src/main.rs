use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    error::ApiError,
    model::ModelMetadata,
    protocol::{BroadcastResponse, ControlCommand, MotionRequest, MountRequest, MountResponse},
};

#[derive(Parser, Debug)]
#[command(name = "previewctl", about = "Send commands to previewers through the preview relay server")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a model by URL or path, or mount a local directory and load a file from it.
    Load {
        locator: Option<String>,
        /// Send the locator as `modelPath` instead of `modelUrl`.
        #[arg(long)]
        as_path: bool,
        #[arg(long, requires = "file", conflicts_with = "locator")]
        dir: Option<String>,
        /// Model file inside `--dir`.
        #[arg(long)]
        file: Option<String>,
        /// Model JSON sent inline so the previewer can skip fetching it.
        #[arg(long)]
        model_data: Option<PathBuf>,
    },
    Expression {
        name: String,
    },
    Motion {
        group: String,
        index: Option<i64>,
    },
    Clear,
    UpdateCanvas,
    Mount {
        dir: String,
    },
}

async fn post<B: Serialize, T: DeserializeOwned>(
    http: &Client,
    server_url: &str,
    path: &str,
    body: &B,
) -> Result<T> {
    let url = format!("{}{path}", server_url.trim_end_matches('/'));
    let res = http
        .post(&url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to reach preview server: {url}"))?;
    if !res.status().is_success() {
        let status = res.status();
        let message = match res.json::<ApiError>().await {
            Ok(err) => err.message,
            Err(_) => "no error body".to_string(),
        };
        bail!("{path} failed with {status}: {message}");
    }
    Ok(res.json::<T>().await?)
}

fn load_command(
    locator: String,
    as_path: bool,
    model_data: Option<ModelMetadata>,
) -> ControlCommand {
    let (model_url, model_path) = if as_path {
        (None, Some(locator))
    } else {
        (Some(locator), None)
    };
    ControlCommand::LoadModel {
        model_url,
        model_path,
        model_data,
    }
}

fn motion_command(group: String, index: Option<i64>) -> ControlCommand {
    let motion = match index {
        Some(index) => MotionRequest::Indexed {
            motion: group,
            index: Some(index),
        },
        None => MotionRequest::Group(group),
    };
    ControlCommand::PlayMotion { motion }
}

fn mounted_url(server_url: &str, base_path: &str, file: &str) -> String {
    format!(
        "{}{}/{}",
        server_url.trim_end_matches('/'),
        base_path,
        file.trim_start_matches('/')
    )
}

async fn mount(http: &Client, server_url: &str, dir: String) -> Result<MountResponse> {
    post(http, server_url, "/api/models/mount", &MountRequest { dir }).await
}

async fn send(http: &Client, server_url: &str, command: ControlCommand) -> Result<()> {
    let name = command.name();
    let res: BroadcastResponse = post(http, server_url, "/api/commands", &command).await?;
    println!("{name} delivered to {} previewer(s)", res.delivered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let http = Client::new();
    let server_url = cli.server_url.as_str();

    let command = match cli.command {
        Command::Load {
            locator,
            as_path,
            dir,
            file,
            model_data,
        } => {
            let locator = match (locator, dir, file) {
                (Some(locator), _, _) => locator,
                (None, Some(dir), Some(file)) => {
                    let mounted = mount(&http, server_url, dir).await?;
                    println!("mounted at {}", mounted.base_path);
                    mounted_url(server_url, &mounted.base_path, &file)
                }
                _ => bail!("load needs a locator or --dir with --file"),
            };
            let model_data = match model_data {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    Some(
                        serde_json::from_str::<ModelMetadata>(&raw)
                            .with_context(|| format!("invalid model JSON in {}", path.display()))?,
                    )
                }
                None => None,
            };
            load_command(locator, as_path, model_data)
        }
        Command::Expression { name } => ControlCommand::SetExpression { expression: name },
        Command::Motion { group, index } => motion_command(group, index),
        Command::Clear => ControlCommand::ClearModel,
        Command::UpdateCanvas => ControlCommand::UpdateCanvas,
        Command::Mount { dir } => {
            let mounted = mount(&http, server_url, dir).await?;
            println!("{}", mounted.base_path);
            return Ok(());
        }
    };

    send(&http, server_url, command).await
}
