//! Contract Test: DirectNIC export caching
//!
//! Constraints verified:
//! - The export is read once per adapter and served from cache afterwards
//! - `invalidate()` makes the next call re-read the file
//! - A missing or empty export degrades to `(0, [])` and is not cached
//! - Domains absent from the export come back unknown-valued

use domsync_core::traits::{Credentials, ProviderAdapter};
use domsync_provider_directnic::DirectNicAdapter;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing_test::traced_test;

const HEADER: &str = "domain_name,exdate,nameservers,privacy,auto_renew\n";

fn export(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(HEADER.as_bytes()).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

fn rewrite(file: &NamedTempFile, rows: &[&str]) {
    let mut contents = HEADER.to_string();
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    std::fs::write(file.path(), contents).unwrap();
}

#[tokio::test]
async fn lists_domains_in_file_order() {
    let file = export(&[
        "example.com,3/15/2024,ns1|ns2,Off,On",
        "example.net,1/2/2027,ns.example.net,On,On",
    ]);
    let adapter = DirectNicAdapter::new(file.path());

    let list = adapter.list_domains(&Credentials::None).await;

    assert_eq!(list.count, 2);
    assert_eq!(list.names, ["example.com", "example.net"]);
}

#[tokio::test]
async fn details_are_normalized() {
    let file = export(&["example.com,3/15/2024,ns1|ns2,Off,On"]);
    let adapter = DirectNicAdapter::new(file.path());

    let record = adapter.get_domain_details(&Credentials::None, "example.com").await;

    assert_eq!(record.expiration, chrono::NaiveDate::from_ymd_opt(2024, 3, 15));
    assert_eq!(record.dns_servers, ["ns1", "ns2"]);
    assert_eq!(record.privacy, Some(false));
    assert_eq!(record.auto_renew, Some(true));

    let legacy = record.to_legacy();
    assert_eq!(legacy.expiry_date, "2024-03-15");
    assert_eq!(legacy.privacy, "0");
    assert_eq!(legacy.autorenew, "1");
}

#[tokio::test]
async fn export_is_cached_until_invalidated() {
    let file = export(&["first.com,1/1/2030,,On,On"]);
    let adapter = DirectNicAdapter::new(file.path());

    assert_eq!(adapter.list_domains(&Credentials::None).await.names, ["first.com"]);
    assert!(adapter.is_loaded().await);

    rewrite(&file, &["second.com,1/1/2030,,On,On"]);
    assert_eq!(adapter.list_domains(&Credentials::None).await.names, ["first.com"]);

    adapter.invalidate().await;
    assert!(!adapter.is_loaded().await);
    assert_eq!(adapter.list_domains(&Credentials::None).await.names, ["second.com"]);
}

#[tokio::test]
#[traced_test]
async fn missing_file_is_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = DirectNicAdapter::new(dir.path().join("DirectNIC-Import.csv"));

    let list = adapter.list_domains(&Credentials::None).await;

    assert!(list.is_empty());
    assert!(!adapter.is_loaded().await);
    assert!(logs_contain("Unable to get domain list"));
}

#[tokio::test]
#[traced_test]
async fn header_only_export_is_not_cached() {
    let file = export(&[]);
    let adapter = DirectNicAdapter::new(file.path());

    assert!(adapter.list_domains(&Credentials::None).await.is_empty());
    assert!(!adapter.is_loaded().await);
    assert!(logs_contain("Unable to get domain list"));

    // A later export is picked up without invalidation
    rewrite(&file, &["late.com,6/30/2026,,Off,Off"]);
    assert_eq!(adapter.list_domains(&Credentials::None).await.count, 1);
}

#[tokio::test]
#[traced_test]
async fn absent_domain_is_unknown() {
    let file = export(&["example.com,3/15/2024,ns1|ns2,Off,On"]);
    let adapter = DirectNicAdapter::new(file.path());

    let record = adapter.get_domain_details(&Credentials::None, "missing.com").await;

    assert_eq!(record.domain, "missing.com");
    assert!(record.is_unknown());
    assert!(logs_contain("Domain not present in DirectNIC export"));
}
