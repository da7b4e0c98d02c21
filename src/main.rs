use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use time::UtcOffset;

use gatewatch::detection::ocr::init_ocr_engine;
use gatewatch::detection::{YoloDetector, YoloParams};
use gatewatch::logging::init_tracing;
use gatewatch::{
    AccessDecision, AllowListDb, ArtifactStore, AuditLog, CameraStill, CycleReport, FrameSource,
    GateConfig, GatePipeline, MqttGate, PipelineContext, PlateDetector, StillImage, TextRecognizer,
    VehicleDetector, plate,
};

const MQTT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "gatewatch")]
#[command(about = "Read license plates from a gate camera and open the gate for known vehicles")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "FILE", default_value = "gatewatch.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save crop artifacts under this directory instead of the configured ones
    #[arg(long, value_name = "DIR")]
    artifact_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Capture and process frames until interrupted (default)
    Run,
    /// Capture and process a single frame
    Once,
    /// Process an existing image file as a single frame
    Image {
        #[arg(value_name = "IMAGE")]
        path: PathBuf,
    },
    /// Print the canonical form of a raw plate reading
    Normalize {
        #[arg(value_name = "TEXT")]
        text: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Must happen while the process is still single-threaded
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    init_tracing(cli.verbose);

    let command = cli.command.unwrap_or(Command::Run);
    if let Command::Normalize { text } = &command {
        let canonical = plate::normalize(text);
        println!("{}\t{:?}", canonical, canonical.quality());
        return Ok(());
    }

    let mut config = GateConfig::load_or_default(&cli.config)?;
    if let Some(dir) = cli.artifact_dir {
        config.audit.save_artifacts = true;
        config.audit.car_dir = dir.join("processed_cars");
        config.audit.plate_dir = dir.join("processed_plates");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        match command {
            Command::Run => serve(CameraStill::from_config(&config.camera), &config, utc_offset, true).await,
            Command::Once => serve(CameraStill::from_config(&config.camera), &config, utc_offset, false).await,
            Command::Image { path } => serve(StillImage::new(path), &config, utc_offset, false).await,
            // printed above without starting a runtime
            Command::Normalize { .. } => unreachable!(),
        }
    })
}

/// Build every stage from `config` and run either the capture loop or a
/// single cycle over `frames`
async fn serve<F: FrameSource>(
    frames: F,
    config: &GateConfig,
    utc_offset: UtcOffset,
    forever: bool,
) -> anyhow::Result<()> {
    let models = &config.models;
    let params = YoloParams {
        input_size: models.input_size,
        confidence: models.confidence,
        iou: models.iou,
        classes: Vec::new(),
    };

    tracing::info!(path = %models.vehicle_model.display(), "loading vehicle model");
    let vehicle_model = YoloDetector::load(
        "vehicle",
        &models.vehicle_model,
        YoloParams {
            classes: models.vehicle_classes.clone(),
            ..params.clone()
        },
    )?;
    tracing::info!(path = %models.plate_model.display(), "loading plate model");
    let plate_model = YoloDetector::load("plate", &models.plate_model, params)?;
    tracing::info!("loading OCR models");
    let ocr = init_ocr_engine(models.ocr_model_dir.as_deref())?;

    let artifacts = ArtifactStore::from_config(&config.audit)?;

    let vehicles = VehicleDetector::new(Box::new(vehicle_model))
        .with_brightness(config.preprocessing.alpha, config.preprocessing.beta);
    let plates = PlateDetector::new(Box::new(plate_model));
    let recognizer =
        TextRecognizer::new(Box::new(ocr)).with_artifact_path(artifacts.resized_plate_path());

    let allow_list = AllowListDb::open(&config.store.database).await?;
    let (gate, mqtt_task) = MqttGate::connect(&config.mqtt);
    let decision = AccessDecision::new(allow_list, gate).with_utc_offset(utc_offset);

    let mut pipeline = GatePipeline::new(frames, vehicles, plates, recognizer, decision)
        .with_context(PipelineContext {
            interval: config.cycle.interval(),
            utc_offset,
        })
        .with_audit_log(AuditLog::new(&config.audit.log_file))
        .with_artifacts(artifacts);

    if forever {
        tracing::info!(interval = ?config.cycle.interval(), "starting capture loop");
        pipeline.run(shutdown_signal()).await;
    } else {
        let report = pipeline.run_cycle().await;
        print_report(&report);
    }

    pipeline.decision().gate().disconnect().await;
    if tokio::time::timeout(MQTT_FLUSH_TIMEOUT, mqtt_task).await.is_err() {
        tracing::warn!("MQTT connection did not close in time");
    }
    pipeline.decision().allow_list().close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

fn print_report(report: &CycleReport) {
    println!("\n=== Gate Cycle ===");
    println!("Status: {:?}", report.status);
    println!("Vehicles detected: {}", report.vehicles);

    if report.plates.is_empty() {
        println!("No license plates recognized.");
        return;
    }

    println!("\nRecognized plates:");
    for outcome in &report.outcomes {
        let verdict = if outcome.granted { "granted" } else { "denied" };
        match &outcome.owner_name {
            Some(owner) => println!("  {} ({:?}) - {} ({})", outcome.plate, outcome.plate.quality(), verdict, owner),
            None => println!("  {} ({:?}) - {}", outcome.plate, outcome.plate.quality(), verdict),
        }
    }
    if report.store_failures > 0 {
        println!("  {} plate(s) could not be checked against the allow-list", report.store_failures);
    }
}
