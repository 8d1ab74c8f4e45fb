use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vaultkey::{
    CryptoError, FileEscrow, KdfParams, KeyEscrow, SetupStore, Storage, VaultKeys,
    default_escrow, default_setup_store,
};

mod auth;

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Argon2 memory cost in KiB (default: 65536)
    #[arg(long = "argon-mem")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations (default: 3)
    #[arg(long = "argon-time")]
    time_cost: Option<u32>,

    /// Argon2 parallelism (default: 2)
    #[arg(long = "argon-parallelism")]
    parallelism: Option<u32>,
}

impl Argon2Args {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        let default = KdfParams::default();

        Ok(KdfParams::new(
            self.mem_cost_kib.unwrap_or(default.mem_cost_kib()),
            self.time_cost.unwrap_or(default.time_cost()),
            self.parallelism.unwrap_or(default.parallelism()),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "vaultkey")]
#[command(version, about = "Set up and unlock a password-wrapped vault encryption key.")]
struct Cli {
    /// Path to the local setup state file
    #[arg(long, global = true, value_name = "PATH", env = "VAULTKEY_STATE")]
    state: Option<PathBuf>,

    /// Path to the wrapped vault key record
    #[arg(long, global = true, value_name = "PATH", env = "VAULTKEY_RECORD")]
    record: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates a vault key wrapped under a new password
    Init {
        #[command(flatten)]
        argon2: Argon2Args,
    },

    /// Checks the password by unwrapping the vault key
    Unlock,

    /// Sets up this device from an existing vault key record
    Link,

    /// Rewraps the vault key under a new password
    Passwd,

    /// Shows setup state and record metadata
    Status,

    /// Forgets the local setup state
    Reset,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("VAULTKEY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(cli: &Cli) -> Result<VaultKeys<FileEscrow>> {
    let setup = match &cli.state {
        Some(p) => SetupStore::new(Storage::new(p.clone())),
        None => default_setup_store()?,
    };
    let escrow = match &cli.record {
        Some(p) => FileEscrow::new(Storage::new(p.clone())),
        None => default_escrow()?,
    };
    Ok(VaultKeys::new(setup, escrow))
}

fn run(cli: Cli) -> Result<()> {
    let vault = open(&cli)?;

    match cli.command {
        Commands::Init { argon2 } => {
            let kdf = argon2.to_kdf_params()?;
            if kdf.is_below_recommended() {
                tracing::warn!(
                    mem_cost_kib = kdf.mem_cost_kib(),
                    "argon2 memory cost is below the recommended 8 MiB"
                );
            }
            let password = auth::read_new_password_with_confirmation(auth::PASSWORD_ENV)?;
            vault.with_kdf(kdf).setup(password)?;
            println!("vault key initialized");
        }
        Commands::Unlock => {
            let password = auth::read_password()?;
            vault.unlock(password)?;
            println!("vault unlocked");
        }
        Commands::Link => {
            let password = auth::read_password()?;
            vault.link(password)?;
            println!("device linked");
        }
        Commands::Passwd => {
            let old = auth::read_password()?;
            let new = auth::read_new_password_with_confirmation(auth::NEW_PASSWORD_ENV)?;
            vault.change_password(old, new)?;
            println!("password changed");
        }
        Commands::Status => {
            let state = vault.status()?;
            println!("setup:       {}", if state.has_setup() { "complete" } else { "not set up" });
            if let Some(salt) = state.salt() {
                println!("salt:        {salt}");
            }
            match vault.escrow().fetch()? {
                Some(record) => {
                    let kdf = record.kdf_params();
                    println!("key version: {}", record.version());
                    println!(
                        "argon2id:    t={} m={}KiB p={}",
                        kdf.time_cost(),
                        kdf.mem_cost_kib(),
                        kdf.parallelism()
                    );
                    println!("updated:     {}", record.updated_at());
                }
                None => println!("record:      none"),
            }
        }
        Commands::Reset => {
            vault.reset()?;
            println!("setup state cleared");
        }
    }

    Ok(())
}

fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run(Cli::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) if CryptoError::is_authentication_failure(&e) => {
            eprintln!("Error: {}", CryptoError::AuthenticationFailure);
            std::process::ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
