mod pipeline;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lens_data::LayoutProfile;
use lens_vision::{preprocess, TopSide};
use pipeline::Pipeline;

/// Classify rhythm-game capture frames and read the on-screen counters.
#[derive(Parser)]
#[command(name = "scorelens", version, about)]
struct Args {
    /// Screenshot files, in capture order
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Which edge of the raw capture the HUD top sits on
    #[arg(long, value_enum, default_value = "right")]
    top: TopArg,

    /// Substitute layout profile (JSON); defaults to the built-in layout
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Directory for the rolling log file
    #[arg(long, default_value = "log")]
    log_dir: PathBuf,

    /// Emit one JSON object per frame instead of the summary lines
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TopArg {
    Left,
    Right,
    None,
}

impl From<TopArg> for TopSide {
    fn from(value: TopArg) -> Self {
        match value {
            TopArg::Left => TopSide::Left,
            TopArg::Right => TopSide::Right,
            TopArg::None => TopSide::Unknown,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let file_appender = tracing_appender::rolling::daily(&args.log_dir, "scorelens.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scorelens=debug,lens_vision=debug,lens_state=debug,lens_data=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let profile = match &args.profile {
        Some(path) => LayoutProfile::load(path)?,
        None => LayoutProfile::builtin(),
    };
    let top = TopSide::from(args.top);
    let mut pipeline = Pipeline::from_profile(&profile)?;

    info!("Processing {} frame(s)", args.frames.len());

    for path in &args.frames {
        let img = image::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .to_rgba8();
        let frame = preprocess::orient(&img, top);

        let reading = match pipeline.process(&frame) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if args.json {
            println!(
                "{}",
                serde_json::json!({
                    "file": path.display().to_string(),
                    "phase": reading.phase,
                    "inPlay": reading.in_play,
                    "score": reading.score.as_ref().map(|c| c.as_str()),
                    "exScore": reading.ex_score.as_ref().map(|c| c.as_str()),
                    "accepted": reading.accepted,
                })
            );
        } else if let (Some(score), Some(ex_score)) = (&reading.score, &reading.ex_score) {
            if reading.accepted {
                println!("file:{}, score:{}, EXscore:{}", path.display(), score, ex_score);
            } else {
                warn!(
                    "file:{}: reading discarded (counter went backwards)",
                    path.display()
                );
            }
        }
    }

    if let Some((score, ex_score)) = pipeline.last_accepted() {
        info!("Final accepted counters: score {}, EX score {}", score, ex_score);
    }

    Ok(())
}
