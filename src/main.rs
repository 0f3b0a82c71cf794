use anyhow::Result;
use clap::Parser;
use petbrain_lib::app::Session;
use petbrain_lib::model::config::BrainConfig;
use petbrain_lib::model::metrics::init_logging;
use petbrain_lib::model::state::{EvolutionPath, PetStage, PetVitals};
use std::io::Write;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "brain.toml")]
    config: String,

    /// Growth stage of the simulated pet
    #[arg(short, long, value_enum, default_value = "egg")]
    stage: Stage,

    /// Evolution path of the simulated pet
    #[arg(short, long, value_enum, default_value = "healthy")]
    path: Path,

    #[arg(long, default_value_t = 20)]
    hunger: u32,

    #[arg(long, default_value_t = 70)]
    happiness: u32,

    #[arg(long, default_value_t = 90)]
    health: u32,

    /// How long to watch the brain, in seconds
    #[arg(short, long, default_value_t = 10)]
    duration: u64,

    /// Evolve the pet to this stage halfway through the run
    #[arg(long, value_enum)]
    evolve_to: Option<Stage>,

    /// Print full cell records as JSON lines instead of summaries
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Stage {
    Egg,
    Baby,
    Teen,
    Adult,
}

impl From<Stage> for PetStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Egg => PetStage::Egg,
            Stage::Baby => PetStage::Baby,
            Stage::Teen => PetStage::Teen,
            Stage::Adult => PetStage::Adult,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Path {
    Healthy,
    Neglected,
    Undetermined,
}

impl From<Path> for EvolutionPath {
    fn from(path: Path) -> Self {
        match path {
            Path::Healthy => EvolutionPath::Healthy,
            Path::Neglected => EvolutionPath::Neglected,
            Path::Undetermined => EvolutionPath::Undetermined,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let config = BrainConfig::load(&args.config)?;
    let vitals = PetVitals::new(
        args.hunger,
        args.happiness,
        args.health,
        args.stage.into(),
        args.path.into(),
    );
    let session = Session::start(config, vitals)?;
    let duration = Duration::from_secs(args.duration);

    let stdout = std::io::stdout();
    let watched = session.watch(duration, |batch, summary| {
        let mut out = stdout.lock();
        if args.json {
            for cell in batch {
                serde_json::to_writer(&mut out, cell)?;
                writeln!(out)?;
            }
        } else {
            writeln!(out, "{summary}")?;
        }
        Ok(())
    });

    let evolve = async {
        if let Some(stage) = args.evolve_to {
            tokio::time::sleep(duration / 2).await;
            session.evolve(stage.into()).await?;
        }
        std::future::pending::<Result<()>>().await
    };

    let batches = tokio::select! {
        result = watched => result?,
        result = evolve => {
            result?;
            0
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            0
        }
    };

    session.shutdown();
    if !args.json {
        println!("Watched {batches} batches.");
    }
    Ok(())
}
