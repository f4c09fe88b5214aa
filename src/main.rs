mod distance;
mod loader;
mod predictor;
mod range;
mod report;
mod session;
mod table;
mod value;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use distance::Distance;
use loader::{LoadState, TableLoader, TableSource};
use session::{ScriptSource, Session, StdinSource};
use value::{parse_entered_time, TimeConvention};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Convention {
    /// "6.49" means 6.49 seconds
    Decimal,
    /// "6.49" means 6 minutes 49 seconds
    MinuteDot,
}

impl From<Convention> for TimeConvention {
    fn from(c: Convention) -> Self {
        match c {
            Convention::Decimal => TimeConvention::DecimalSeconds,
            Convention::MinuteDot => TimeConvention::MinuteDotSecond,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "sprint-splits-rs")]
#[command(about = "Sprint split predictor - predicts 30m to 600m times from one known split", long_about = None)]
struct Args {
    /// Short-distance reference table (path or http(s) URL)
    #[arg(long, env = "SPRINT_SHORT_TABLE", default_value = "table20_100m_200m_controls.csv")]
    short_table: String,

    /// Long-distance reference table (path or http(s) URL)
    #[arg(long, env = "SPRINT_LONG_TABLE", default_value = "table21_400m_200m_endurance_controls.csv")]
    long_table: String,

    /// How a period in table cells is read
    #[arg(long, value_enum, env = "SPRINT_TIME_CONVENTION", default_value = "decimal")]
    convention: Convention,

    /// Known distance: 30-fly, 30-blocks, 60, 100, 150, 200, 250, 300, 400 or 600
    #[arg(short, long, requires = "time")]
    distance: Option<String>,

    /// Known time in seconds (or M:SS.ss)
    #[arg(short, long, requires = "distance")]
    time: Option<String>,

    /// Print predictions as JSON
    #[arg(long)]
    json: bool,

    /// Read queries from a file instead of stdin
    #[arg(long, conflicts_with = "distance")]
    script: Option<PathBuf>,

    /// Seconds to wait for the tables in one-shot mode
    #[arg(long, default_value = "30")]
    load_timeout: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let convention = TimeConvention::from(args.convention);

    let loader = TableLoader::new(
        TableSource::parse(&args.short_table),
        TableSource::parse(&args.long_table),
    );
    log::info!(
        "[LOAD] Loading tables: short={} long={} (cells read as {})",
        args.short_table,
        args.long_table,
        convention.name()
    );
    loader.start();

    if let (Some(distance), Some(time)) = (&args.distance, &args.time) {
        return predict_once(&loader, convention, distance, time, &args);
    }

    if !args.json {
        println!("{}", "=".repeat(50));
        println!("  Sprint Split Predictor");
        println!("{}", "=".repeat(50));
        println!();
    }

    if let Some(path) = &args.script {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        let source = ScriptSource::new(text.lines().map(str::to_string));
        let mut session = Session::new(source, std::io::stdout(), loader, convention)
            .with_json(args.json)
            .queue_while_loading(true);
        return session.run();
    }

    if !args.json {
        println!("Type `help` for usage. Press Ctrl+C to stop");
        println!();
    }
    let mut session = Session::new(StdinSource::new(), std::io::stdout(), loader, convention)
        .with_json(args.json);
    session.run()
}

fn predict_once(
    loader: &TableLoader,
    convention: TimeConvention,
    distance: &str,
    time: &str,
    args: &Args,
) -> Result<()> {
    let distance: Distance = distance.parse()?;
    let time = parse_entered_time(time).context("Please enter a valid time in seconds")?;

    match loader.wait(Duration::from_secs(args.load_timeout)) {
        LoadState::Ready(_) => {}
        LoadState::Failed(reason) => bail!("Could not load reference tables: {}", reason),
        LoadState::Loading => bail!(
            "Reference tables still loading after {}s",
            args.load_timeout
        ),
    }

    let prediction = loader.predictor(convention)?.predict(distance, time)?;
    if args.json {
        println!("{}", report::render_json(&prediction, convention.name())?);
    } else {
        println!(
            "Predictions from {} = {}",
            distance.label(),
            report::format_time(time)
        );
        println!();
        print!("{}", report::render_table(&prediction));
    }

    Ok(())
}
