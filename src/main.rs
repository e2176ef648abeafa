// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wise_tee_validator::matcher::PaymentClaim;
use wise_tee_validator::service::ValidatorService;
use wise_tee_validator::tappd::TappdClient;
use wise_tee_validator::wise::WiseClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(clap::Subcommand)]
enum Action {
    /// Encrypt a provider API credential under the TEE app key
    Encrypt {
        /// Plaintext Wise API credential
        #[arg(short, long)]
        credential: String,
    },
    /// Verify a claimed payment against provider transactions
    Verify {
        /// Hex-encoded encrypted credential
        #[arg(long)]
        ciphertext: String,

        /// Hex-encoded initialization vector
        #[arg(long)]
        iv: String,

        /// Claimed amount as a decimal string
        #[arg(long)]
        amount: String,

        /// Claimed 3-letter currency code
        #[arg(long)]
        currency: String,

        /// Claimed payment time, RFC 3339
        #[arg(long)]
        timestamp: String,

        /// Claimed payment status
        #[arg(long, default_value = "COMPLETED")]
        status: String,
    },
    /// Generate a standalone attestation report over user data
    Report {
        /// Data to bind into the report
        #[arg(short, long, default_value = "")]
        user_data: String,
    },
}

fn service_from_env() -> ValidatorService {
    let tappd = match std::env::var("TAPPD_ENDPOINT") {
        Ok(endpoint) => TappdClient::with_base_url(endpoint),
        Err(_) => TappdClient::new(),
    };
    let wise = match std::env::var("WISE_API_URL") {
        Ok(url) => WiseClient::with_base_url(url),
        Err(_) => WiseClient::new(),
    };
    ValidatorService::new(Arc::new(tappd), Box::new(wise))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let service = service_from_env();

    match args.action {
        Action::Encrypt { credential } => {
            let outcome = service.encrypt_credentials(&credential)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Action::Verify {
            ciphertext,
            iv,
            amount,
            currency,
            timestamp,
            status,
        } => {
            let ciphertext = hex::decode(ciphertext)?;
            let iv = hex::decode(iv)?;
            let claim = PaymentClaim {
                amount,
                currency,
                timestamp,
                status,
            };
            let outcome = service.verify_payment(&ciphertext, &iv, &claim)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Action::Report { user_data } => {
            let report = service.generate_report(&user_data)?;
            println!("{report}");
        }
    }

    Ok(())
}
