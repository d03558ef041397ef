use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use preview_core::{
    ChannelConfig, Controller, ErrorCategory, JsonFileStore, LogGate, PreviewEvent, Session,
    SettingsStore, UserInput,
};
use shared::{domain::Bounds, protocol::ControlCommand};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{info, warn};

mod headless;
mod input;

use headless::HeadlessRenderHost;

#[derive(Parser, Debug)]
#[command(about = "Headless model previewer driven over the preview control socket")]
struct Args {
    /// Page the previewer is served from; the control socket lives on the same host.
    #[arg(long, default_value = "http://127.0.0.1:8000/static/live2d/index.html")]
    page_url: String,
    #[arg(long, default_value = "preview-settings.json")]
    settings: PathBuf,
    /// Size of the element hosting the canvas, `WxH`.
    #[arg(long, default_value = "1280x800", value_parser = parse_size)]
    container: (f64, f64),
    /// Model-local bounds `x,y,w,h`; defaults to the model's `Layout`.
    #[arg(long, value_parser = parse_bounds)]
    model_bounds: Option<Bounds>,
    /// Model to load at startup.
    #[arg(long)]
    model: Option<String>,
}

fn parse_size(raw: &str) -> Result<(f64, f64)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WxH, got {raw:?}"))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

fn parse_bounds(raw: &str) -> Result<Bounds> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid bounds {raw:?}"))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Bounds::new(*x, *y, *w, *h)),
        _ => Err(anyhow!("expected x,y,w,h, got {raw:?}")),
    }
}

fn describe(event: &PreviewEvent) -> String {
    match event {
        PreviewEvent::ConnectionStatus { connected, url } => {
            let state = if *connected { "connected" } else { "disconnected" };
            format!("[connection] {state} {url}")
        }
        PreviewEvent::ModelInfo {
            name,
            expressions,
            motion_groups,
        } => format!(
            "[model] {name}; expressions: {}; motions: {}",
            list_or_none(expressions),
            list_or_none(motion_groups)
        ),
        PreviewEvent::ModelCleared => "[model] cleared".to_string(),
        PreviewEvent::TransformChanged(t) => format!(
            "[transform] x={} y={} scale={:.0}% rotation={:.0}° opacity={:.0}%",
            t.offset_x, t.offset_y, t.scale_percent, t.rotation_deg, t.opacity_percent
        ),
        PreviewEvent::ExpressionChanged(name) => {
            format!("[expression] {}", name.as_deref().unwrap_or("-"))
        }
        PreviewEvent::MotionChanged { group, index } => match index {
            Some(index) => format!("[motion] {group}#{index}"),
            None => format!("[motion] {group}"),
        },
        PreviewEvent::ViewportChanged(v) => format!("[viewport] {}x{}", v.width, v.height),
        PreviewEvent::ErrorBanner {
            category, message, ..
        } => format!("[error:{category:?}] {message}"),
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Forwards every event to `out` until the controller is gone. Lagging only skips events.
async fn print_events(
    mut events: broadcast::Receiver<PreviewEvent>,
    mut out: impl FnMut(String),
) {
    loop {
        match events.recv().await {
            Ok(event) => out(describe(&event)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let gate = LogGate::install(false)?;

    let store = JsonFileStore::new(&args.settings);
    let settings = store.load()?;
    let host = HeadlessRenderHost::new(args.container, args.model_bounds);
    let controller = match Controller::new(host, settings) {
        Ok(controller) => controller,
        Err(err) => {
            let banner = PreviewEvent::ErrorBanner {
                category: ErrorCategory::Initialization,
                message: err.to_string(),
                dismiss_after: None,
            };
            eprintln!("{}", describe(&banner));
            return Err(err.into());
        }
    };
    let controller = controller
        .with_settings_store(Box::new(store))
        .with_log_gate(gate);

    let events = controller.subscribe();
    tokio::spawn(print_events(events, |line| println!("{line}")));

    let config = ChannelConfig::for_page(&args.page_url)?;
    let session = Session::new(controller, config);
    let handle = session.handle();

    if let Some(model) = args.model {
        handle
            .send(UserInput::Command(ControlCommand::load(model)))
            .await;
    }

    println!("{}", input::HELP);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match input::parse_line(&line) {
                Ok(Some(input)) => {
                    if !handle.send(input).await {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => eprintln!("{err}"),
            }
        }
        handle.send(UserInput::Shutdown).await;
    });

    let controller = session.run().await;
    info!(model = ?controller.model().map(|m| m.locator.as_str()), "previewer stopped");
    Ok(())
}
