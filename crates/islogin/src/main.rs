#![forbid(unsafe_code)]

//! islogin CLI: verify Island.is login tokens.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use islogin::keys::{CertificateValidityPolicy, TrustPolicy, TrustedCertificate};
use islogin::{VerificationConfig, Verifier};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "islogin", about = "Verify Island.is SAML login tokens", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a base64 login token and print the user as JSON
    Verify {
        /// File holding the token, `-` for stdin
        #[arg(default_value = "-")]
        token_file: PathBuf,

        /// The input is the decoded XML rather than base64
        #[arg(long)]
        xml: bool,

        /// Audience the token must be issued for
        #[arg(long = "audience-url")]
        audience_url: Option<String>,

        /// Skip the NotBefore/NotOnOrAfter check
        #[arg(long = "no-verify-dates")]
        no_verify_dates: bool,

        /// Accept only this signer certificate (PEM, repeatable)
        #[arg(long = "pin-cert", conflicts_with = "trust_anchor")]
        pin_cert: Vec<PathBuf>,

        /// Require a chain to this CA certificate (PEM, repeatable)
        #[arg(long = "trust-anchor")]
        trust_anchor: Vec<PathBuf>,

        /// Reject signer certificates outside their validity window
        #[arg(long = "enforce-cert-validity")]
        enforce_cert_validity: bool,

        /// Clock skew tolerance in seconds
        #[arg(long = "clock-skew")]
        clock_skew: Option<u64>,

        /// JSON configuration file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Debug logging on stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show supported algorithms
    Info,
}

struct VerifyArgs {
    token_file: PathBuf,
    xml: bool,
    audience_url: Option<String>,
    no_verify_dates: bool,
    pin_cert: Vec<PathBuf>,
    trust_anchor: Vec<PathBuf>,
    enforce_cert_validity: bool,
    clock_skew: Option<u64>,
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Verify {
            token_file,
            xml,
            audience_url,
            no_verify_dates,
            pin_cert,
            trust_anchor,
            enforce_cert_validity,
            clock_skew,
            config,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_verify(VerifyArgs {
                token_file,
                xml,
                audience_url,
                no_verify_dates,
                pin_cert,
                trust_anchor,
                enforce_cert_validity,
                clock_skew,
                config,
            })
        }
        Commands::Info => cmd_info(),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "islogin=debug,islogin_dsig=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_verify(args: VerifyArgs) -> anyhow::Result<ExitCode> {
    let config = build_config(&args)?;
    let input = read_input(&args.token_file)?;
    let token = if args.xml {
        islogin::decoder::encode_token(&input)
    } else {
        input
    };

    tracing::debug!(file = %args.token_file.display(), "verifying token");
    match Verifier::new(config).verify(&token) {
        Ok(accepted) => {
            println!("{}", serde_json::to_string_pretty(&accepted)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(rejection) => {
            eprintln!("{}", serde_json::to_string_pretty(&rejection)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_config(args: &VerifyArgs) -> anyhow::Result<VerificationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = read_file(path)?;
            VerificationConfig::from_json(&json).with_context(|| format!("{}: invalid configuration", path.display()))?
        }
        None => VerificationConfig::default(),
    };

    if let Some(url) = &args.audience_url {
        config.audience_url = Some(url.clone());
    }
    if args.no_verify_dates {
        config.verify_dates = false;
    }
    if !args.pin_cert.is_empty() {
        config.trust = TrustPolicy::Pinned {
            certificates: load_certificates(&args.pin_cert)?,
        };
    }
    if !args.trust_anchor.is_empty() {
        config.trust = TrustPolicy::Chain {
            anchors: load_certificates(&args.trust_anchor)?,
        };
    }
    if args.enforce_cert_validity {
        config.certificate_validity = CertificateValidityPolicy::Enforce;
    }
    if let Some(secs) = args.clock_skew {
        config.clock_skew_secs = secs;
    }
    Ok(config)
}

fn load_certificates(paths: &[PathBuf]) -> anyhow::Result<Vec<TrustedCertificate>> {
    paths
        .iter()
        .map(|path| {
            let pem = read_file(path)?;
            TrustedCertificate::from_pem(&pem).with_context(|| format!("{}: not a PEM certificate", path.display()))
        })
        .collect()
}

fn cmd_info() -> anyhow::Result<ExitCode> {
    println!("islogin {}: Island.is login token verifier", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Supported canonicalization:");
    println!("  Exclusive C14N 1.0 (±comments)");
    println!("  C14N 1.0 (±comments)");
    println!();
    println!("Supported digest algorithms:");
    for uri in islogin::crypto::digest::SUPPORTED {
        println!("  {uri}");
    }
    println!();
    println!("Supported signature algorithms:");
    for uri in islogin::crypto::verify::SUPPORTED {
        println!("  {uri}");
    }
    println!();
    println!("Trust policies:");
    println!("  embedded-certificate (default), pinned (--pin-cert), chain (--trust-anchor)");
    Ok(ExitCode::SUCCESS)
}

// ── Utility functions ────────────────────────────────────────────────

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read token from stdin")?;
        if input.trim().is_empty() {
            bail!("no token on stdin");
        }
        return Ok(input);
    }
    read_file(path)
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("{}: cannot read", path.display()))
}
