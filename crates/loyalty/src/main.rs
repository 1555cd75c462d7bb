use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use loyalty::attestation::{load_or_create_signer, load_signer};
use loyalty::{RootConfig, RootError};
use loyalty_core::{
    credential_message, derive_scheme_id, verify_signature, Principal, SchemeId, Timestamp,
};

/// Loyalty: store credentials, cashback receipts and attested rewards.
#[derive(Parser, Debug)]
#[command(name = "loyalty", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default configuration and generate the attestation key
    Init {
        /// Identity of the controller
        #[arg(long)]
        controller: Option<String>,

        /// Where to keep the attestation key
        #[arg(long)]
        key_path: Option<PathBuf>,
    },

    /// Print the scheme id a store would get for a scheme name
    SchemeId {
        #[arg(long)]
        issuer: String,

        #[arg(long)]
        name: String,
    },

    /// Check a store-signed credential claim
    VerifyClaim {
        #[arg(long)]
        scheme_id: String,

        #[arg(long)]
        issuer: String,

        #[arg(long)]
        holder: String,

        /// Nanoseconds since the Unix epoch
        #[arg(long)]
        timestamp: u64,

        #[arg(long)]
        reward: u64,

        /// Uncompressed secp256k1 public key, hex
        #[arg(long)]
        public_key: String,

        /// 64-byte r||s signature, hex
        #[arg(long)]
        signature: String,
    },

    /// Print the attestation verifying key
    AttestationKey,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("loyalty=debug,loyalty_cred=debug,loyalty_vault=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loyalty=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => RootConfig::load(&RootConfig::default_config_path()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but its answer was negative.
async fn run(cli: Cli) -> Result<bool, RootError> {
    match cli.command {
        Commands::Init {
            controller,
            key_path,
        } => cmd_init(cli.config.as_ref(), controller, key_path),
        Commands::SchemeId { issuer, name } => {
            println!("{}", derive_scheme_id(&Principal::new(issuer), &name));
            Ok(true)
        }
        Commands::VerifyClaim {
            scheme_id,
            issuer,
            holder,
            timestamp,
            reward,
            public_key,
            signature,
        } => {
            let message = credential_message(
                &SchemeId::new(scheme_id),
                &Principal::new(issuer),
                &Principal::new(holder),
                Timestamp::from_nanos(timestamp),
                reward,
            );
            let public_key = hex::decode(public_key.trim())
                .map_err(|e| RootError::Serialization(format!("public key: {}", e)))?;
            let signature = hex::decode(signature.trim())
                .map_err(|e| RootError::Serialization(format!("signature: {}", e)))?;
            let valid = verify_signature(&public_key, message.as_bytes(), &signature);
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(valid)
        }
        Commands::AttestationKey => {
            let config = load_config(cli.config.as_ref())?;
            let signer = load_signer(&config.attestation.key_path)?;
            println!("{}", signer.verifying_key_hex());
            Ok(true)
        }
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    controller: Option<String>,
    key_path: Option<PathBuf>,
) -> Result<bool, RootError> {
    let mut config = load_config(config_path)?;
    if let Some(c) = controller {
        config.controller = c;
    }
    if let Some(kp) = key_path {
        config.attestation.key_path = kp;
    }
    config.validate()?;

    info!("initializing loyalty");

    let (signer, created) = load_or_create_signer(&config.attestation.key_path)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    println!("Loyalty initialized successfully.");
    println!("  Controller:      {}", config.controller);
    println!("  Config:          {}", save_path.display());
    println!(
        "  Attestation key: {} ({})",
        config.attestation.key_path.display(),
        if created { "generated" } else { "existing" }
    );
    println!("  Verifying key:   {}", signer.verifying_key_hex());

    Ok(true)
}
