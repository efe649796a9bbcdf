use std::{collections::BTreeMap, fs::File, io::Read, path::PathBuf};

use anyhow::{Context, Error};
use clap::Parser;
use clap_stdin::MaybeStdin;
use isomdoc::{definitions::IssuerSigned, presentation::Stringify};
use tracing_subscriber::EnvFilter;

mod x509;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Print the namespaces and element identifiers disclosed in an IssuerSigned structure.
    GetNamespaces {
        /// Unpadded base64url encoded CBOR IssuerSigned.
        issuer_signed: MaybeStdin<String>,
    },
    /// Parse an IACA or Document Signer certificate and print its profile as JSON.
    InspectCert {
        /// Path to a PEM-encoded certificate.
        cert: PathBuf,
    },
    /// Validate a document signer cert against the IACA that issued it.
    ValidateCerts {
        /// Path to PEM-encoded document signer cert.
        ds: PathBuf,
        /// Path to PEM-encoded IACA root cert.
        iaca: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().action {
        Action::GetNamespaces { issuer_signed } => print_namespaces(&issuer_signed),
        Action::InspectCert { cert } => inspect_cert(cert),
        Action::ValidateCerts { ds, iaca } => validate_certs(ds, iaca).await,
    }
}

fn print_namespaces(issuer_signed: &str) -> Result<(), Error> {
    let claims = namespaces(issuer_signed)?;
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

fn namespaces(issuer_signed: &str) -> Result<BTreeMap<String, Vec<String>>, Error> {
    Ok(IssuerSigned::parse(issuer_signed)
        .context("could not parse IssuerSigned")?
        .claims()
        .into_iter()
        .map(|(ns, elements)| (ns, elements.into_keys().collect()))
        .collect())
}

fn inspect_cert(cert: PathBuf) -> Result<(), Error> {
    let pem = read(&cert)?;
    let description = x509::inspect(&pem)
        .with_context(|| format!("could not parse {}", cert.display()))?;
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}

async fn validate_certs(ds: PathBuf, iaca: PathBuf) -> Result<(), Error> {
    let validation_errors = x509::validate(&read(&ds)?, &read(&iaca)?).await?;
    if validation_errors.is_empty() {
        println!("Validated!");
    } else {
        println!(
            "Validation errors:\n{}",
            serde_json::to_string_pretty(&validation_errors)?
        )
    }
    Ok(())
}

fn read(path: &PathBuf) -> Result<Vec<u8>, Error> {
    let mut bytes = vec![];
    File::open(path)
        .with_context(|| format!("could not open {}", path.display()))?
        .read_to_end(&mut bytes)?;
    Ok(bytes)
}
