//! Preview a DirectNIC export
//!
//! Reads the CSV given as the first argument (or `docs/DirectNIC-Import.csv`)
//! and prints each domain the way it would be stored.
//!
//! ```bash
//! cargo run --bin directnic_preview -- /path/to/DirectNIC-Import.csv
//! ```

use clap::Parser;
use domsync_core::traits::{Credentials, ProviderAdapter};
use domsync_provider_directnic::{DEFAULT_EXPORT_FILE, DirectNicAdapter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(about = "Print the domains a DirectNIC export would sync")]
struct Args {
    /// DirectNIC CSV export
    #[arg(default_value = DEFAULT_EXPORT_FILE)]
    path: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let Args { path } = Args::parse();
    let adapter = DirectNicAdapter::new(&path);

    let list = adapter.list_domains(&Credentials::None).await;
    if list.is_empty() {
        eprintln!("No domains found in {}", path.display());
        return ExitCode::FAILURE;
    }

    println!("{} domain(s) in {}\n", list.count, path.display());
    for name in &list.names {
        let fields = adapter
            .get_domain_details(&Credentials::None, name)
            .await
            .to_legacy();
        println!(
            "{:<32} expires {}  privacy {:<1}  autorenew {:<1}  dns {}",
            fields.domain,
            fields.expiry_date,
            fields.privacy,
            fields.autorenew,
            fields.dns_servers.join(", ")
        );
    }

    ExitCode::SUCCESS
}
