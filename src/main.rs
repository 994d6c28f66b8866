use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use teller::config::DatabaseSettings;
use teller::{
    find_statements, new_transactions, BatchRunner, DatabaseKind, DuplicatePolicy, FileOutcome,
    LineFailurePolicy, PdfTextExtractor, Settings, SqliteStore, StatementParser, TextExtractor,
    TransactionStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "teller",
    version,
    about = "Import transactions from PDF bank and credit-card statements",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// TOML settings file; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    import: ImportArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse every statement under a directory and store the new transactions (default)
    Import(ImportArgs),

    /// Print the extracted text of one PDF and the institution detected for it
    DumpText { pdf: PathBuf },
}

#[derive(Args, Debug, Default, Clone)]
struct ImportArgs {
    /// Directory searched recursively for *.pdf (default: statements)
    #[arg(short = 'd', long)]
    pdf_dir: Option<PathBuf>,

    #[arg(short = 't', long, value_enum)]
    db_type: Option<DatabaseKind>,

    /// Database name; SQLite writes <name>.db (default: teller)
    #[arg(short = 'n', long)]
    db_name: Option<String>,

    #[arg(short = 'H', long)]
    db_host: Option<String>,

    #[arg(short = 'P', long)]
    db_port: Option<u16>,

    #[arg(short = 'u', long)]
    db_username: Option<String>,

    #[arg(short = 'p', long)]
    db_password: Option<String>,

    /// Ask before keeping each duplicate transaction
    #[arg(long)]
    interactive: bool,

    /// Exclude a statement when any transaction line fails to parse
    #[arg(long)]
    strict_lines: bool,

    /// Parse and report without touching the database
    #[arg(long)]
    dry_run: bool,

    /// Also write the new transactions to this CSV file
    #[arg(long)]
    export_csv: Option<PathBuf>,
}

impl ImportArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.pdf_dir {
            settings.scan.directory = dir.clone();
        }

        let db = &mut settings.database;
        if let Some(kind) = self.db_type {
            db.kind = kind;
        }
        if let Some(name) = &self.db_name {
            db.name = name.clone();
        }
        if self.db_host.is_some() {
            db.host = self.db_host.clone();
        }
        if self.db_port.is_some() {
            db.port = self.db_port;
        }
        if self.db_username.is_some() {
            db.username = self.db_username.clone();
        }
        if self.db_password.is_some() {
            db.password = self.db_password.clone();
        }

        if self.interactive {
            settings.parse.duplicate_policy = DuplicatePolicy::Interactive;
        }
        if self.strict_lines {
            settings.parse.line_failures = LineFailurePolicy::Fail;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let mut settings = Settings::load_or_default(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Import(cli.import)) {
        Command::Import(args) => {
            args.apply(&mut settings);
            run_import(&settings, &args)
        }
        Command::DumpText { pdf } => dump_text(&pdf),
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("teller=info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn open_store(database: &DatabaseSettings) -> Result<Box<dyn TransactionStore>> {
    match database.kind {
        DatabaseKind::Sqlite => {
            let path = database.sqlite_path();
            let store = SqliteStore::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(store))
        }
        #[cfg(feature = "mariadb")]
        DatabaseKind::Mariadb => {
            let config = database.mariadb()?;
            let store = teller::MariaDbStore::connect(&config)
                .context("Failed to connect to MariaDB")?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "mariadb"))]
        DatabaseKind::Mariadb => {
            database.mariadb()?;
            anyhow::bail!("this build has no MariaDB support; rebuild with `--features mariadb`")
        }
    }
}

fn run_import(settings: &Settings, args: &ImportArgs) -> Result<()> {
    println!("🏦 Teller: PDF statements → transactions");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Nothing is read or written unless the input directory exists
    let root = &settings.scan.directory;
    let candidates = find_statements(root)?;
    println!("\n📂 {} statement(s) under {}", candidates.len(), root.display());

    // 2. Database
    let mut store = if args.dry_run {
        None
    } else {
        println!("\n🔧 Setting up database...");
        let mut store = open_store(&settings.database)?;
        store.ensure_schema().context("Failed to create schema")?;
        Some(store)
    };

    // 3. Parse
    println!("\n📄 Parsing statements...");
    let mut runner = BatchRunner::new(settings.parse);
    let report = runner.run_files(candidates);

    for outcome in &report.outcomes {
        match outcome {
            FileOutcome::Parsed {
                path,
                institution,
                report,
                unparsed_lines,
                ..
            } => {
                println!("  ✓ {} [{}] {}", path.display(), institution, report.summary());
                if !unparsed_lines.is_empty() {
                    println!("    ⚠️  {} line(s) could not be parsed", unparsed_lines.len());
                }
            }
            FileOutcome::Skipped { path, reason } => {
                println!("  - {} skipped: {}", path.display(), reason);
            }
            FileOutcome::Failed { path, error } => {
                println!("  ✗ {} failed: {}", path.display(), error);
            }
        }
    }

    // 4. Subtract what is already stored
    let fresh = match store.as_mut() {
        Some(store) => {
            let existing = store
                .existing_transactions()
                .context("Failed to read stored transactions")?;
            new_transactions(&report.transactions, &existing)
        }
        None => report.sorted_transactions(),
    };

    if let Some(path) = &args.export_csv {
        teller::export::write_csv(path, &fresh)?;
    }

    // 5. Insert
    let inserted = match store.as_mut() {
        Some(store) => store
            .insert_transactions(&fresh)
            .context("Failed to insert transactions")?,
        None => {
            info!("Dry run, nothing written");
            0
        }
    };

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✓ Files: {} parsed, {} skipped, {} failed",
        report.parsed_count(),
        report.skipped_count(),
        report.failed_count()
    );
    println!("✓ Transactions found: {}", report.transactions.len());
    println!("✓ New transactions: {}", fresh.len());
    println!("✓ Inserted: {}", inserted);

    if report.failed_count() > 0 {
        warn!("{} statement(s) were excluded; see the log for diagnostics", report.failed_count());
    }

    Ok(())
}

fn dump_text(pdf: &Path) -> Result<()> {
    let text = PdfTextExtractor.extract(pdf)?;
    println!("{}", text);

    let parser = StatementParser::new(Default::default());
    match parser.detect_institution(&text) {
        Some(institution) => println!("\n🏦 Detected: {} ({})", institution, institution.name()),
        None => println!("\n❓ No known institution detected"),
    }

    Ok(())
}
