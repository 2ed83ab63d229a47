mod commands;
mod uploads;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use colored::Colorize;
use commands::{Command, HELP};
use kubrick_client::{ChatDispatcher, KubrickApi, KubrickClient, StatusPoller, UploadPipeline};
use kubrick_core::{
    Config, MediaFile, MediaKind, ProcessingStatus, Role, SessionStore, SharedSession, VideoId,
};
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use uploads::UploadTasks;

/// How long `/quit` waits for running uploads before abandoning them.
const UPLOAD_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "kubrick-cli")]
#[command(about = "Chat with the Kubrick video assistant")]
#[command(version)]
struct Cli {
    /// Service base URL (overrides config.toml and KUBRICK_API_BASE)
    #[arg(long)]
    api_base: Option<String>,

    /// Seconds between status polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Directory the service mounts uploaded videos under
    #[arg(long)]
    media_dir: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = Config::new();
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(secs) = cli.poll_interval {
        config.poll_interval_secs = secs;
    }
    if cli.media_dir.is_some() {
        config.media_dir = cli.media_dir;
    }
    debug!("Using config: {:?}", config);

    let client = Arc::new(KubrickClient::new(&config).context("building HTTP client")?);
    let session = SessionStore::from_config(&config).into_shared();

    let cancel = CancellationToken::new();
    let poller = StatusPoller::new(client.clone(), session.clone(), config.poll_interval())
        .spawn(cancel.clone());

    let result = run_interactive_chat(client, session, &config).await;

    cancel.cancel();
    if let Err(err) = poller.await {
        eprintln!("{}", format!("Status poller ended abnormally: {}", err).red());
    }
    result
}

async fn run_interactive_chat(
    client: Arc<KubrickClient>,
    session: SharedSession,
    config: &Config,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(UploadPipeline::new(client.clone(), session.clone()));
    let dispatcher = ChatDispatcher::from_config(client.clone(), session.clone(), config);

    println!("{}", "Kubrick".cyan().bold());
    println!("{}", format!("Service: {}", client.base_url()).dimmed());
    println!("{}", "Type /help for commands, /quit to leave".dimmed());
    println!();
    for message in session.read().await.messages() {
        print_message(message.role, &message.content);
    }

    let mut uploads = UploadTasks::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        uploads.reap();
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let outcome = match Command::parse(&line) {
            Command::Quit => break,
            Command::Chat(text) => chat(&dispatcher, &client, &text).await,
            Command::Attach(path) => attach(&session, &path).await,
            Command::Detach => {
                if session.write().await.clear_attachment() {
                    println!("{}", "Attachment dropped".dimmed());
                }
                Ok(())
            }
            Command::Upload(path) => upload(&pipeline, &mut uploads, &path).await,
            Command::Videos => {
                list_videos(&session).await;
                Ok(())
            }
            Command::Select(id) => select(&session, &id).await,
            Command::Remove(id) => remove(&session, &id).await,
            Command::Clip(out) => save_clip(&client, &session, out.as_deref()).await,
            Command::Reset => reset(&client).await,
            Command::History => {
                for message in session.read().await.messages() {
                    print_message(message.role, &message.content);
                }
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Invalid(line) => Err(anyhow!("unknown command: {} (try /help)", line)),
        };

        if let Err(e) = outcome {
            println!("{}", format!("Error: {:#}", e).red());
        }
    }

    let running = uploads.reap();
    if running > 0 {
        println!(
            "{}",
            format!("Waiting for {} upload(s) to finish...", running).dimmed()
        );
        let report = uploads.drain(UPLOAD_GRACE).await;
        if report.abandoned > 0 {
            println!(
                "{}",
                format!(
                    "Abandoned {} upload(s) still in progress after {:?}",
                    report.abandoned, UPLOAD_GRACE
                )
                .yellow()
            );
        }
    }

    println!("{}", "Goodbye, Dave.".cyan());
    Ok(())
}

fn print_message(role: Role, content: &str) {
    match role {
        Role::User => println!("{} {}", "You:".cyan().bold(), content),
        Role::Assistant => println!("{} {}", "HAL:".green().bold(), content),
    }
}

async fn chat(
    dispatcher: &ChatDispatcher,
    client: &KubrickClient,
    text: &str,
) -> anyhow::Result<()> {
    let Some(turn) = dispatcher.send(text).await else {
        return Ok(());
    };

    print_message(Role::Assistant, &turn.reply);
    if let Some(clip_path) = turn.clip_path.as_deref() {
        println!(
            "{}",
            format!("Clip: {} (/clip to download)", client.media_url(clip_path)).dimmed()
        );
    }
    println!();
    Ok(())
}

async fn load_media(path: &str) -> anyhow::Result<MediaFile> {
    let path = Path::new(path);
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("not a file path: {}", path.display()))?;
    let kind = MediaKind::from_file_name(name)
        .ok_or_else(|| anyhow!("unsupported file type: {}", name))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(MediaFile::new(name, kind, bytes))
}

async fn attach(session: &SharedSession, path: &str) -> anyhow::Result<()> {
    let file = load_media(path).await?;
    let label = format!("Attached {} {} ({} bytes)", file.kind(), file.name(), file.len());
    session.write().await.stage_attachment(file);
    println!("{}", label.dimmed());
    Ok(())
}

async fn upload(
    pipeline: &Arc<UploadPipeline>,
    uploads: &mut UploadTasks,
    path: &str,
) -> anyhow::Result<()> {
    let file = load_media(path).await?;
    if file.kind() != MediaKind::Video {
        bail!("only videos can be uploaded, {} is not a video", file.name());
    }

    println!("{}", format!("Uploading {}...", file.name()).dimmed());
    let pipeline = Arc::clone(pipeline);
    uploads.spawn(async move {
        match pipeline.submit(file).await {
            Ok(job) => println!(
                "\n{}",
                format!("Video {} is processing (job {})", job.video_id, job.job_id).green()
            ),
            Err(err) => println!("\n{}", format!("Upload failed: {}", err).red()),
        }
    });
    Ok(())
}

async fn list_videos(session: &SharedSession) {
    let store = session.read().await;
    if store.videos().is_empty() {
        println!("{}", "No videos uploaded".dimmed());
        return;
    }
    let active = store.active_video_id();
    for video in store.videos() {
        let marker = if Some(&video.id) == active { "*" } else { " " };
        let status = match video.status {
            ProcessingStatus::Completed => video.status.as_str().green(),
            ProcessingStatus::Failed => video.status.as_str().red(),
            _ => video.status.as_str().yellow(),
        };
        println!(
            "{} {}  {}  {}  {}",
            marker,
            video.id,
            video.file.name(),
            status,
            video.created_at.format("%H:%M:%S").to_string().dimmed()
        );
    }
}

async fn select(session: &SharedSession, id: &str) -> anyhow::Result<()> {
    if !session.write().await.select_video(&VideoId::from(id)) {
        bail!("no video with id {}", id);
    }
    println!("{}", format!("Selected {}", id).dimmed());
    Ok(())
}

async fn remove(session: &SharedSession, id: &str) -> anyhow::Result<()> {
    let removed = session
        .write()
        .await
        .remove_video(&VideoId::from(id))
        .ok_or_else(|| anyhow!("no video with id {}", id))?;
    println!("{}", format!("Removed {}", removed.file.name()).dimmed());
    Ok(())
}

async fn save_clip(
    client: &KubrickClient,
    session: &SharedSession,
    out: Option<&str>,
) -> anyhow::Result<()> {
    let clip_path = session
        .read()
        .await
        .messages()
        .iter()
        .rev()
        .find(|message| message.role == Role::Assistant)
        .and_then(|message| message.clip_path.clone())
        .ok_or_else(|| anyhow!("the last reply has no clip"))?;

    let bytes = client.fetch_media(&clip_path).await?;
    let target = match out {
        Some(out) => out.to_string(),
        None => kubrick_client::utils::media_file_name(&clip_path).to_string(),
    };
    tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("writing {}", target))?;
    println!("{}", format!("Saved {} bytes to {}", bytes.len(), target).dimmed());
    Ok(())
}

async fn reset(client: &KubrickClient) -> anyhow::Result<()> {
    let message = client.reset_memory().await?;
    println!("{}", message.dimmed());
    Ok(())
}
