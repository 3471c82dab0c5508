use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use std::fs;
use std::path::PathBuf;
use tracing::Level;
use workledger::entry::DATE_FORMAT;
use workledger::{Config, EntryForm, EntryStore, UuidV7Ids, WorkEntry, to_csv};

#[derive(Parser)]
#[command(name = "workledger")]
#[command(about = "Record, search and export client work entries")]
#[command(version)]
struct Cli {
    /// Path to the config file (default: platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory from the config
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new work entry
    Add(EntryArgs),

    /// Replace the fields of an existing entry
    Edit {
        /// Entry id
        id: String,

        #[command(flatten)]
        fields: EditArgs,
    },

    /// Delete an entry
    Delete {
        /// Entry id
        id: String,
    },

    /// List entries, most recent first
    List {
        /// Only show entries matching this text
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Show one entry in full
    Show {
        /// Entry id
        id: String,
    },

    /// Total hours and amount over all entries
    Totals,

    /// Export entries as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only export entries matching this text
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct EntryArgs {
    /// Client name
    #[arg(long)]
    client: String,

    /// Date of the work (yyyy-MM-dd, default: today)
    #[arg(long)]
    date: Option<String>,

    #[arg(long, default_value = "")]
    location: String,

    #[arg(long, default_value = "")]
    description: String,

    /// Hours worked (invalid input counts as 0)
    #[arg(long, default_value = "")]
    hours: String,

    /// Amount charged (invalid input counts as 0)
    #[arg(long, default_value = "")]
    amount: String,

    #[arg(long, default_value = "")]
    materials: String,
}

#[derive(Args)]
struct EditArgs {
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    hours: Option<String>,
    #[arg(long)]
    amount: Option<String>,
    #[arg(long)]
    materials: Option<String>,
}

impl EntryArgs {
    fn into_form(self) -> EntryForm {
        let date = self.date.unwrap_or_else(today);

        EntryForm {
            client_name: self.client,
            date,
            location: self.location,
            description: self.description,
            hours: self.hours,
            amount: self.amount,
            materials: self.materials,
        }
    }
}

impl EditArgs {
    /// Overlay the given fields on a form prefilled from the current entry
    fn overlay(self, mut form: EntryForm) -> EntryForm {
        let fields = [
            (self.client, &mut form.client_name),
            (self.date, &mut form.date),
            (self.location, &mut form.location),
            (self.description, &mut form.description),
            (self.hours, &mut form.hours),
            (self.amount, &mut form.amount),
            (self.materials, &mut form.materials),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        form
    }
}

/// Local calendar date as `yyyy-MM-dd`
fn today() -> String {
    chrono::Local::now().date_naive().format(DATE_FORMAT).to_string()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Setup tracing
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log_level.parse::<Level>().unwrap_or(Level::WARN)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config => print!("{}", config.to_yaml()?),
        command => {
            let backend = config.open_backend()?;
            let mut store = EntryStore::new(backend, config.storage_key.clone(), Box::new(UuidV7Ids))?;
            store.load();
            run(command, &mut store)?;
        }
    }

    Ok(())
}

fn run(command: Commands, store: &mut EntryStore) -> Result<()> {
    match command {
        Commands::Add(args) => {
            let entry = store.create(args.into_form())?;
            store.save()?;
            println!("{} {}", "Added".green(), entry.id.dimmed());
        }
        Commands::Edit { id, fields } => {
            let existing = store.get(&id).ok_or_else(|| eyre!("No entry with id {}", id))?.clone();
            let updated = fields.overlay(EntryForm::from_entry(&existing)).apply_to(&existing)?;
            store.upsert(updated);
            store.save()?;
            println!("{} {}", "Updated".green(), id.dimmed());
        }
        Commands::Delete { id } => {
            if store.delete(&id) {
                store.save()?;
                println!("{} {}", "Deleted".green(), id.dimmed());
            } else {
                println!("{} {}", "No entry with id".yellow(), id);
            }
        }
        Commands::List { search } => {
            let entries = store.search(&search);
            if entries.is_empty() {
                println!("{}", "No entries".yellow());
            }
            for entry in &entries {
                print_row(entry);
            }
        }
        Commands::Show { id } => {
            let entry = store.get(&id).ok_or_else(|| eyre!("No entry with id {}", id))?;
            print_details(entry);
        }
        Commands::Totals => {
            println!("{:<8} {}", "Entries".bold(), store.len());
            println!("{:<8} {:.2}", "Hours".bold(), store.total_hours());
            println!("{:<8} {:.2}", "Amount".bold(), store.total_amount());
        }
        Commands::Export { output, search } => {
            let csv = to_csv(&store.search(&search))?;
            match output {
                Some(path) => {
                    fs::write(&path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("{} {}", "Exported to".green(), path.display());
                }
                None => print!("{}", csv),
            }
        }
        // Printed in main without opening the store
        Commands::Config => {}
    }

    Ok(())
}

fn print_row(entry: &WorkEntry) {
    println!(
        "{}  {:<24} {:>7.2}h {:>10.2}  {}",
        entry.date.format(DATE_FORMAT),
        entry.client_name.bold(),
        entry.hours,
        entry.amount,
        entry.id.dimmed()
    );
}

fn print_details(entry: &WorkEntry) {
    let rows = [
        ("Id", entry.id.clone()),
        ("Client", entry.client_name.clone()),
        ("Date", entry.date.format(DATE_FORMAT).to_string()),
        ("Location", entry.location.clone()),
        ("Description", entry.description.clone()),
        ("Hours", entry.hours.to_string()),
        ("Amount", entry.amount.to_string()),
        ("Materials", entry.materials.clone()),
    ];
    for (label, value) in rows {
        println!("{:<12} {}", label.bold(), value);
    }
}
