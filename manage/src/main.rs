//! Project management commands: apply, create, list and revert migrations.
//!
//! Run from repo root: `cargo run -p manage -- migrate --prefix CreateNew`

mod migrations;

use clap::{Parser, Subcommand};
use mason_sdk::{Db, Migrator, Settings};

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations of a prefix.
    Migrate {
        #[clap(short, long, default_value = "")]
        prefix: String,
    },
    /// Create an empty SQL migration.
    Migration {
        #[clap(short, long)]
        name: String,
        #[clap(short, long, default_value = "")]
        prefix: String,
    },
    /// List applied and pending migrations of a prefix.
    Status {
        #[clap(short, long, default_value = "")]
        prefix: String,
    },
    /// Run `down` for one applied migration and forget it.
    Revert {
        #[clap(short, long)]
        name: String,
        #[clap(short, long, default_value = "")]
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mason_sdk=info,manage=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let migrator = Migrator::new(&settings.migrations_dir, migrations::registry())?;

    match cli.command {
        Command::Migration { name, prefix } => {
            migrator.scaffold(&prefix, &name)?;
        }
        Command::Migrate { prefix } => {
            let mut db = Db::from_settings(&settings).await?;
            let applied = migrator.run(&mut db, &prefix).await?;
            if applied.is_empty() {
                tracing::info!(prefix = %prefix, "nothing to migrate");
            }
        }
        Command::Status { prefix } => {
            let mut db = Db::from_settings(&settings).await?;
            for record in migrator.history(&mut db, &prefix).await? {
                println!(
                    "applied  {} (at {})",
                    record.get_as::<String>("name")?,
                    record.get("applied_at")?
                );
            }
            for name in migrator.pending(&mut db, &prefix).await? {
                println!("pending  {}", name);
            }
        }
        Command::Revert { name, prefix } => {
            let mut db = Db::from_settings(&settings).await?;
            migrator.revert(&mut db, &prefix, &name).await?;
        }
    }
    Ok(())
}
