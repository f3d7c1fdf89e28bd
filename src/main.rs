use tracing::info;

use slotbook::config::Config;
use slotbook::engine::Engine;
use slotbook::model::*;

/// `<label>[:count[:spacing]]` → a schedule request. A bare basic label asks
/// for one slot; a bare recurring label for a one-slot batch.
fn parse_request(arg: &str) -> Result<(Priority, ScheduleRequest), Box<dyn std::error::Error>> {
    let mut parts = arg.split(':');
    let priority: Priority = parts.next().unwrap_or_default().parse()?;
    let count = parts.next().map(str::parse::<usize>).transpose()?;
    let week_spacing = parts.next().map(str::parse::<u32>).transpose()?;
    if parts.next().is_some() {
        return Err(format!("unexpected argument {arg:?}").into());
    }
    let request = match (priority.family(), count, week_spacing) {
        (Family::Basic, None, None) => ScheduleRequest::Next(priority),
        (_, count, spacing) => ScheduleRequest::Batch {
            priority,
            count: count.unwrap_or(1),
            week_spacing: spacing.unwrap_or(1),
        },
    };
    Ok((priority, request))
}

async fn run(engine: &Engine, arg: &str) -> Result<(), Box<dyn std::error::Error>> {
    if arg == "dump" {
        println!("{}", serde_json::to_string(&engine.snapshot().await?)?);
        return Ok(());
    }
    if let Some(path) = arg.strip_prefix("import=") {
        let doc: SnapshotDocument = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        engine.import(&doc.into()).await?;
        return Ok(());
    }

    let (priority, request) = parse_request(arg)?;
    for slot in engine.schedule_now(request).await? {
        let line = serde_json::json!({
            "priority": priority.label(),
            "at": format_ms(slot.at),
            "after_seconds": slot.after_seconds,
        });
        println!("{line}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    slotbook::observability::init(config.metrics_port);
    info!("slotbook starting");
    info!("  store: {:?}", config.store);
    info!("  data_dir: {}", config.data_dir.display());
    info!("  max_conflict_retries: {}", config.max_conflict_retries);

    let engine = config.build_engine()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: slotbook <label>[:count[:spacing]] | dump | import=<file> ...");
        std::process::exit(2);
    }
    for arg in &args {
        if let Err(e) = run(&engine, arg).await {
            tracing::error!("{arg}: {e}");
            return Err(e);
        }
    }
    Ok(())
}
