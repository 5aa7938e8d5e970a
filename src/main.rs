use anyhow::{Context, Result};
use std::env;
use std::path::Path;

// Use library instead of local modules
use price_reconciliation::{
    codec, Actor, AppConfig, ChangeSet, ReconciliationService,
};

const USAGE: &str = "Usage:
  price-reconciliation compare <new.csv> [--export <out.csv>] [--replace]
  price-reconciliation replace <new.csv>
  price-reconciliation baseline
  price-reconciliation history [limit]";

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let config = AppConfig::load()?;

    match args.get(1).map(String::as_str) {
        Some("compare") => run_compare(&config, &args[2..])?,
        Some("replace") => run_replace(&config, &args[2..])?,
        Some("baseline") => run_baseline(&config)?,
        Some("history") => run_history(&config, &args[2..])?,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_compare(config: &AppConfig, args: &[String]) -> Result<()> {
    let input = args.first().context("compare needs a CSV file")?;
    let export_path = flag_value(args, "--export");
    let replace = args.iter().any(|a| a == "--replace");

    println!("⚖️  Price Comparison");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let service = ReconciliationService::from_config(config)?;

    println!("\n📂 Loading {}...", input);
    let upload = codec::parse_file(Path::new(input))?;
    println!("✓ Loaded {} rows", upload.len());

    println!("\n🔍 Comparing against {}...", config.baseline_dir.join(&config.baseline_file).display());
    let change_set = service.compare(&upload.rows, Actor::Cli)?;
    print_change_set(&change_set);

    if let Some(path) = export_path {
        if change_set.is_empty() {
            println!("\n(no export written: nothing changed)");
        } else {
            let bytes = service.export(&change_set.changes)?;
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write export: {}", path))?;
            println!("\n💾 Exported {} changes to {}", change_set.len(), path);
        }
    }

    if replace {
        let info = service.replace_baseline_dataset(&upload, Actor::Cli)?;
        println!("\n✓ Baseline replaced ({} rows, {})", info.row_count, short(&info.fingerprint));
    }

    Ok(())
}

fn run_replace(config: &AppConfig, args: &[String]) -> Result<()> {
    let input = args.first().context("replace needs a CSV file")?;

    let service = ReconciliationService::from_config(config)?;
    let upload = codec::parse_file(Path::new(input))?;
    let info = service.replace_baseline_dataset(&upload, Actor::Cli)?;

    println!("✓ Baseline replaced: {}", info.location);
    println!("  Rows:        {}", info.row_count);
    println!("  Fingerprint: {}", info.fingerprint);

    Ok(())
}

fn run_baseline(config: &AppConfig) -> Result<()> {
    let service = ReconciliationService::from_config(config)?;
    let (dataset, fingerprint) = service.baseline()?;

    println!("📄 Baseline: {}", config.baseline_dir.join(&config.baseline_file).display());
    println!("  Rows:        {}", dataset.len());
    println!("  Columns:     {}", dataset.headers.len());
    println!("  Fingerprint: {}", fingerprint);

    if let Some(price_header) = dataset
        .headers
        .iter()
        .find(|h| h.starts_with(price_reconciliation::MARKET_PRICE_PREFIX))
    {
        println!("  Price column: {}", price_header);
    } else {
        println!("  ⚠️  No market price column");
    }

    Ok(())
}

fn run_history(config: &AppConfig, args: &[String]) -> Result<()> {
    let limit = match args.first() {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("Invalid limit: {}", raw))?,
        None => 20,
    };

    if config.audit_db.is_none() {
        eprintln!("❌ Audit log disabled. Set PRICE_RECON_AUDIT_DB or audit_db in the config file.");
        std::process::exit(1);
    }

    let service = ReconciliationService::from_config(config)?;
    for event in service.history(limit)? {
        println!(
            "{}  {:<18} {:<4} {}  {}",
            event.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            event.kind.as_str(),
            event.actor,
            short(event.baseline.as_deref().unwrap_or("-")),
            event.details
        );
    }

    Ok(())
}

fn print_change_set(change_set: &ChangeSet) {
    let stats = &change_set.stats;
    println!(
        "✓ {} incoming rows, {} matched, {} new, {} no longer listed",
        stats.incoming_rows, stats.matched, stats.unmatched, stats.baseline_unclaimed
    );

    println!("\n{}", change_set.message());
    if change_set.is_empty() {
        return;
    }

    println!(
        "\n{:<40} {:>8} {:>10} {:>10} {:>10} {:>9}",
        "Product", "Number", "Old", "New", "Change", "%"
    );
    for change in &change_set.changes {
        println!(
            "{:<40} {:>8} {:>10} {:>10} {:>10} {:>8}%",
            truncate(&change.product_name, 40),
            truncate(&change.card_number, 8),
            format!("${}", change.old_price),
            format!("${}", change.new_price),
            format!("${}", change.price_change),
            change.percentage_change
        );
    }
    println!(
        "\n📈 {} up, 📉 {} down",
        change_set.increases(),
        change_set.decreases()
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(width - 1).collect();
        out.push('…');
        out
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
