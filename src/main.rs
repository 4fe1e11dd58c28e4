use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use plantsnap_lib::capture::{
    self, CameraDevice, CameraSlot, Facing, FfmpegCamera, ShutterAction,
};
use plantsnap_lib::llm::{self, provider, Provider};
use plantsnap_lib::presentation::{self, render, render_viewport};
use plantsnap_lib::settings::{self, Settings};
use plantsnap_lib::{
    LineLayoutParser, Outcome, Pipeline, PlantIdentifier, RawImage, ResponseParser, ViewState,
};

#[derive(Parser)]
#[command(name = "plantsnap")]
#[command(about = "Snap or upload a plant photo and get it identified")]
#[command(version)]
struct Cli {
    /// Provider for this run (gemini, anthropic). Overrides saved settings.
    #[arg(long, global = true)]
    provider: Option<Provider>,

    /// Model id for this run
    #[arg(long, global = true)]
    model: Option<String>,

    /// Print the view as JSON instead of the text table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify a plant from an image file
    Identify {
        file: PathBuf,
    },
    /// Open the camera, take a photo and identify it
    Camera {
        /// Capture device (e.g. /dev/video0). Defaults to the saved device.
        #[arg(long)]
        device: Option<String>,

        /// Frames to let through before the photo can be taken
        #[arg(long, default_value_t = 5)]
        warmup_frames: u64,

        /// Capture frame rate
        #[arg(long, default_value_t = 15)]
        framerate: u32,
    },
    /// Parse a saved model reply (file or `-` for stdin)
    Parse {
        file: Option<PathBuf>,
    },
    /// Inspect and change provider settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show providers, keys and saved preferences
    Show,
    /// Save the default provider
    SetProvider { provider: Provider },
    /// Store an API key in the OS keychain
    SaveKey { provider: Provider, key: String },
    /// Send a tiny request to check a provider's key
    Test { provider: Option<Provider> },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let env_file = settings::load_env_files();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Some(path) = env_file {
        log::info!("[STARTUP] Loaded env from {}", path.display());
    }

    let cli = Cli::parse();
    let mut settings = Settings::load();
    if let Some(model) = cli.model.clone() {
        settings.model = Some(model);
    }
    let run = Run {
        settings,
        provider: cli.provider,
        json: cli.json,
    };

    match cli.command {
        Commands::Identify { file } => run_identify(&run, file).await,
        Commands::Camera {
            device,
            warmup_frames,
            framerate,
        } => run_camera(&run, device, warmup_frames, framerate).await,
        Commands::Parse { file } => run_parse(file, run.json),
        Commands::Settings { action } => run_settings(&run, action).await,
    }
}

/// Options shared by every subcommand.
struct Run {
    settings: Settings,
    /// `--provider`, which beats both `LLM_PROVIDER` and the saved choice.
    provider: Option<Provider>,
    json: bool,
}

impl Run {
    fn provider(&self) -> Provider {
        self.provider.unwrap_or_else(|| self.settings.resolve_provider())
    }
}

fn build_pipeline(run: &Run) -> Result<Pipeline, llm::IdentificationError> {
    let identifier: Arc<dyn PlantIdentifier> = llm::build_for(&run.settings, run.provider())?;
    let parser: Arc<dyn ResponseParser> = Arc::new(LineLayoutParser::new());
    Ok(Pipeline::new(identifier, parser))
}

/// Show a failure for `image` without a pipeline (no usable client).
fn print_setup_failure(
    image: &RawImage,
    error: &llm::IdentificationError,
    json: bool,
) -> Result<ExitCode> {
    log::error!("[STARTUP] {}", error);
    let mut view = ViewState::default();
    view.begin_request(image.preview());
    view.fail(error.user_message());
    print_view(&view, json)?;
    Ok(ExitCode::FAILURE)
}

fn print_view(view: &ViewState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
    } else {
        print!("{}", render(view));
    }
    Ok(())
}

async fn identify_image(
    run: &Run,
    pipeline: Option<Pipeline>,
    image: RawImage,
) -> Result<ExitCode> {
    let json = run.json;
    let pipeline = match pipeline {
        Some(p) => p,
        None => match build_pipeline(run) {
            Ok(p) => p,
            Err(e) => return print_setup_failure(&image, &e, json),
        },
    };

    let ticket = pipeline.begin(&image);
    if !json {
        print!("{}", render(&pipeline.view()));
    }

    let outcome = pipeline.run(ticket, image).await;
    let mut view = pipeline.view();
    if !json {
        // Preview was already printed with the loading banner.
        view.preview = None;
        println!();
    }
    print_view(&view, json)?;

    Ok(match outcome {
        Outcome::Rendered(_) => ExitCode::SUCCESS,
        Outcome::Failed(_) | Outcome::Superseded => ExitCode::FAILURE,
    })
}

async fn run_identify(run: &Run, file: PathBuf) -> Result<ExitCode> {
    let image = capture::load_upload(&file, run.settings.max_upload_bytes)
        .with_context(|| format!("cannot use {} as a photo", file.display()))?;
    identify_image(run, None, image).await
}

async fn run_camera(
    run: &Run,
    device: Option<String>,
    warmup_frames: u64,
    framerate: u32,
) -> Result<ExitCode> {
    let settings = &run.settings;
    // Build the client first so a missing key fails before the camera turns on.
    let pipeline = match build_pipeline(run) {
        Ok(p) => p,
        Err(e) => {
            log::error!("[STARTUP] {}", e);
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let camera = FfmpegCamera::new(device.or_else(|| settings.camera_device.clone()))
        .with_framerate(framerate);
    let mut slot = CameraSlot::new();

    let session = match camera.open(Facing::Environment).await {
        Ok(session) => session,
        Err(e) => return Ok(camera_unavailable(&e)),
    };
    pipeline.camera_opened(session.viewport());
    slot.install(session);

    let warmup = Duration::from_millis(settings.camera_warmup_ms);
    if let Some(session) = slot.session_mut() {
        if let Err(e) = session.wait_for_frame(warmup_frames, warmup).await {
            slot.dismiss();
            pipeline.camera_closed();
            return Ok(camera_unavailable(&e));
        }
    }

    eprintln!("Press Enter to take the photo, or q then Enter to cancel.");
    let action = capture::wait_for_shutter(
        BufReader::new(tokio::io::stdin()),
        tokio::signal::ctrl_c(),
        Duration::from_millis(250),
        || {
            if let Some(viewport) = slot.viewport() {
                eprint!("\r{}   ", render_viewport(&viewport));
                pipeline.camera_updated(viewport);
            }
        },
    )
    .await?;
    eprintln!();

    if action == ShutterAction::Cancel {
        slot.dismiss();
        pipeline.camera_closed();
        eprintln!("Camera closed.");
        return Ok(ExitCode::SUCCESS);
    }

    let Some(session) = slot.take() else {
        pipeline.camera_closed();
        return Ok(ExitCode::FAILURE);
    };
    let snapshot = session.snapshot();
    pipeline.camera_closed();
    match snapshot {
        Ok(image) => identify_image(run, Some(pipeline), image).await,
        Err(e) => Ok(camera_unavailable(&e)),
    }
}

fn camera_unavailable(error: &capture::CameraAccessError) -> ExitCode {
    log::warn!("[CAMERA] {}", error);
    eprintln!("Camera unavailable: {}", error);
    eprintln!("You can still identify a photo with `plantsnap identify <FILE>`.");
    ExitCode::FAILURE
}

fn run_parse(file: Option<PathBuf>, json: bool) -> Result<ExitCode> {
    let text = match file {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("cannot read stdin")?;
            buf
        }
    };

    let parser = LineLayoutParser::new();
    let record = parser.parse(&text);
    let layout_ok = match parser.check_layout(&text) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("[PARSE] Unexpected reply layout: {}", e);
            false
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", presentation::render_record(&record));
        if !layout_ok {
            println!("{}", presentation::LAYOUT_NOTE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_settings(run: &Run, action: SettingsAction) -> Result<ExitCode> {
    let settings = &run.settings;
    match action {
        SettingsAction::Show => {
            let configured: Vec<&str> = Provider::ALL
                .into_iter()
                .filter(|p| settings.api_key(*p).is_some())
                .map(|p| p.id())
                .collect();
            let active = run.provider();
            let summary = serde_json::json!({
                "activeProvider": active.id(),
                "activeModel": settings.model_for(active),
                "configuredProviders": configured,
                "providers": provider::all_providers(),
                "settingsPath": Settings::path(),
                "settings": settings,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        SettingsAction::SetProvider { provider } => {
            // Start from the file so env overrides are not persisted.
            let path = Settings::path();
            let mut saved = Settings::load_from(&path);
            saved.provider = Some(provider);
            saved.save_to(&path)?;
            println!("Default provider set to {}", provider);
        }
        SettingsAction::SaveKey { provider, key } => {
            let key = key.trim();
            anyhow::ensure!(!key.is_empty(), "API key must not be empty");
            settings::save_api_key(provider, key)?;
            println!("Saved {} key to the OS keychain", provider);
        }
        SettingsAction::Test { provider } => {
            let provider = provider.unwrap_or_else(|| run.provider());
            let start = std::time::Instant::now();
            let result = match llm::build_for(settings, provider) {
                Ok(client) => client.ping().await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => println!("{} OK ({}ms)", provider, start.elapsed().as_millis()),
                Err(e) => {
                    println!("{}", e.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
