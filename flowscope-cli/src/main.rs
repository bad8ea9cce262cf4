use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use engine::{
    EngineConfig, HttpDataSource, PredictionOutcome, ReadinessStatus, TimelineEvent,
    TrafficTimeline, WalkOutcome, load_config,
};
use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use shared::{Scene, SceneId};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flowscope")]
#[command(about = "Stream and replay traffic flow scenes from a flow data server")]
struct Cli {
    /// TOML engine config; defaults apply to every missing field
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `base_url` from the config
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the scenes the server offers
    Scenes,
    /// Prefetch measurements for a scene starting at a step and print readiness
    Prefetch {
        #[arg(long)]
        scene: SceneId,

        #[arg(long, default_value = "0")]
        from: usize,
    },
    /// Play a scene back, printing each step as the cursor reaches it
    Play {
        #[arg(long)]
        scene: SceneId,

        #[arg(long, default_value = "0")]
        from: usize,

        /// Request a prediction at the start position
        #[arg(long)]
        predict: bool,
    },
}

type Timeline = TrafficTimeline<HttpDataSource>;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    config.validate()?;

    let source = HttpDataSource::from_config(&config).context("Failed to build HTTP client")?;
    log::info!("Using flow server at {}", source.base_url());
    let (timeline, events) = TrafficTimeline::new(source, config);

    match cli.command {
        Commands::Scenes => list_scenes(&timeline).await,
        Commands::Prefetch { scene, from } => prefetch(&timeline, events, scene, from).await,
        Commands::Play {
            scene,
            from,
            predict,
        } => play(&timeline, events, scene, from, predict).await,
    }
}

async fn list_scenes(timeline: &Timeline) -> Result<()> {
    let scenes = timeline
        .list_scenes()
        .await
        .context("Failed to list scenes")?;

    for scene in scenes {
        let steps = (scene.measurement_end_time - scene.measurement_start_time)
            .checked_div(scene.step_length)
            .unwrap_or(0);
        println!(
            "{:>6}  {:<24} {} .. {} every {}s ({} steps)",
            scene.scene_id,
            scene.name.as_deref().unwrap_or("-"),
            scene.measurement_start_time,
            scene.measurement_end_time,
            scene.step_length,
            steps
        );
    }
    Ok(())
}

async fn select(timeline: &Timeline, scene_id: SceneId) -> Result<Scene> {
    let scene = timeline
        .list_scenes()
        .await
        .context("Failed to list scenes")?
        .into_iter()
        .find(|scene| scene.scene_id == scene_id);
    let Some(scene) = scene else {
        bail!("Scene {} not found on server", scene_id);
    };
    timeline.select_scene(scene.clone())?;
    Ok(scene)
}

async fn prefetch(
    timeline: &Timeline,
    mut events: UnboundedReceiver<TimelineEvent>,
    scene_id: SceneId,
    from: usize,
) -> Result<()> {
    select(timeline, scene_id).await?;
    timeline.set_cursor(from)?;
    timeline.start_prefetch(from)?;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                timeline.shutdown();
                break WalkOutcome::Aborted;
            }
            event = events.next() => match event {
                Some(TimelineEvent::PrefetchProgress { loaded_steps, total_steps, .. }) => {
                    println!("loaded {}/{} steps", loaded_steps, total_steps);
                }
                Some(TimelineEvent::FetchFailed { start_time, message, .. }) => {
                    println!("fetch at {} failed: {}", start_time, message);
                }
                Some(TimelineEvent::PrefetchFinished { outcome, .. }) => break outcome,
                Some(_) => {}
                None => break WalkOutcome::Aborted,
            }
        }
    };

    println!("prefetch {:?}", outcome);
    print_readiness(&timeline.statuses_snapshot());
    let statistics = timeline.statistics();
    println!(
        "chunks stored {}, hit ratio {:.2}, failures {}, empty {}",
        statistics.chunks_stored,
        statistics.hit_ratio(),
        statistics.fetch_failures,
        statistics.empty_results
    );
    Ok(())
}

async fn play(
    timeline: &Timeline,
    mut events: UnboundedReceiver<TimelineEvent>,
    scene_id: SceneId,
    from: usize,
    predict: bool,
) -> Result<()> {
    select(timeline, scene_id).await?;
    timeline.load_data().await?;
    timeline.set_cursor(from)?;

    if predict {
        match timeline.request_prediction().await {
            Ok(PredictionOutcome::Loaded { steps_updated, .. }) => {
                println!("prediction covers {} steps", steps_updated);
            }
            Ok(outcome) => println!("prediction: {:?}", outcome),
            Err(e) => println!("prediction failed: {:#}", anyhow::Error::from(e)),
        }
    }

    timeline.play()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                timeline.shutdown();
                break;
            }
            event = events.next() => match event {
                Some(TimelineEvent::ViewPublished(view)) => {
                    println!(
                        "[{}] step {:>4} t={} measured {} predicted {}",
                        view.status().symbol(),
                        view.index,
                        view.time,
                        view.measurement.as_ref().map_or(0, |m| m.len()),
                        view.prediction.as_ref().map_or(0, |p| p.len())
                    );
                }
                Some(TimelineEvent::ReferenceDataFailed { message, .. }) => {
                    println!("reference data unavailable: {}", message);
                }
                Some(TimelineEvent::PlaybackStopped { index, .. }) => {
                    println!("playback reached step {}", index);
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    timeline.shutdown();
    Ok(())
}

fn print_readiness(statuses: &[ReadinessStatus]) {
    let line: String = statuses.iter().map(|status| status.symbol()).collect();
    println!("{}", line);
    println!(
        "{} unloaded  {} measurement  {} prediction  {} both",
        ReadinessStatus::Unloaded.symbol(),
        ReadinessStatus::MeasurementLoaded.symbol(),
        ReadinessStatus::PredictionLoaded.symbol(),
        ReadinessStatus::BothLoaded.symbol()
    );
}
