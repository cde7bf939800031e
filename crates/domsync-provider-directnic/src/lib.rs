// # DirectNIC Adapter
//
// DirectNIC has no API for this data, so the adapter reads the account's
// CSV export instead. The first row is the header; every following row is
// one domain, keyed by its `domain_name` column:
//
// ```text
// domain_name,exdate,nameservers,privacy,auto_renew
// example.com,3/15/2024,ns1.example.net|ns2.example.net,Off,On
// ```
//
// - `exdate` is `M/D/YYYY`
// - `nameservers` is pipe-delimited
// - `privacy` and `auto_renew` are "Off" for false, anything else for true
//
// The parsed export is cached by the adapter instance on first use and is
// only re-read after `invalidate()`. A failed or empty load is not cached.

use async_trait::async_trait;
use domsync_core::config::{ProviderConfig, SchedulerConfig};
use domsync_core::normalize::{self, DateFormat, FlagConvention};
use domsync_core::traits::{Credentials, DomainRecord, ProviderAdapter, ProviderAdapterFactory};
use domsync_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where DirectNIC exports are conventionally dropped, relative to the data root
pub const DEFAULT_EXPORT_FILE: &str = "docs/DirectNIC-Import.csv";

const PROVIDER: &str = "directnic";

/// `privacy` column: "Off" means privacy is off
pub const PRIVACY: FlagConvention = FlagConvention::new("Off", false);

/// `auto_renew` column: "Off" means auto-renewal is off
pub const AUTO_RENEW: FlagConvention = FlagConvention::new("Off", false);

/// Privacy flag from the `privacy` column
pub fn process_privacy(raw: &str) -> bool {
    PRIVACY.parse(raw)
}

/// Auto-renew flag from the `auto_renew` column
pub fn process_auto_renew(raw: &str) -> bool {
    AUTO_RENEW.parse(raw)
}

/// One row of the export
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportRow {
    pub domain_name: String,
    #[serde(default)]
    pub exdate: String,
    #[serde(default)]
    pub nameservers: String,
    #[serde(default)]
    pub privacy: String,
    #[serde(default)]
    pub auto_renew: String,
}

impl ExportRow {
    /// Normalized record for this row
    pub fn to_record(&self) -> DomainRecord {
        DomainRecord {
            domain: self.domain_name.clone(),
            expiration: normalize::parse_date(&self.exdate, DateFormat::MonthDayYear),
            dns_servers: normalize::parse_dns_list(&self.nameservers, '|'),
            privacy: Some(process_privacy(&self.privacy)),
            auto_renew: Some(process_auto_renew(&self.auto_renew)),
        }
    }
}

/// A parsed export: rows in file order, indexed by domain name
///
/// A domain listed twice keeps its first position and its last row.
#[derive(Debug, Clone, Default)]
pub struct Export {
    rows: Vec<ExportRow>,
    index: HashMap<String, usize>,
}

impl Export {
    /// Parse CSV text
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let mut export = Self::default();
        for (line, row) in reader.deserialize::<ExportRow>().enumerate() {
            let row = row.map_err(|e| Error::parse(format!("DirectNIC export row {}: {}", line + 2, e)))?;
            if row.domain_name.is_empty() {
                continue;
            }
            export.insert(row);
        }

        Ok(export)
    }

    fn insert(&mut self, row: ExportRow) {
        match self.index.get(&row.domain_name) {
            Some(&pos) => self.rows[pos] = row,
            None => {
                self.index.insert(row.domain_name.clone(), self.rows.len());
                self.rows.push(row);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Domain names in file order
    pub fn domain_names(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.domain_name.clone()).collect()
    }

    /// Row for a domain
    pub fn get(&self, domain: &str) -> Option<&ExportRow> {
        self.index.get(domain).map(|&pos| &self.rows[pos])
    }
}

/// DirectNIC adapter over a CSV export
pub struct DirectNicAdapter {
    path: PathBuf,
    cache: RwLock<Option<Arc<Export>>>,
}

impl std::fmt::Debug for DirectNicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectNicAdapter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DirectNicAdapter {
    /// Create an adapter reading `path`; nothing is read until first use
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the cached export so the next call re-reads the file
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Whether an export is cached
    pub async fn is_loaded(&self) -> bool {
        self.cache.read().await.is_some()
    }

    /// The cached export, loading it on first use
    pub async fn export(&self) -> Result<Arc<Export>> {
        if let Some(export) = self.cache.read().await.as_ref() {
            return Ok(export.clone());
        }

        let mut cache = self.cache.write().await;
        // Another caller may have loaded it while we waited for the lock
        if let Some(export) = cache.as_ref() {
            return Ok(export.clone());
        }

        tracing::debug!("Loading DirectNIC export from {}", self.path.display());
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::config(format!(
                "DirectNIC export {} is not readable: {}",
                self.path.display(),
                e
            ))
        })?;

        let export = Arc::new(Export::parse(&data)?);
        if export.is_empty() {
            return Err(Error::parse(format!(
                "DirectNIC export {} holds no domains",
                self.path.display()
            )));
        }

        tracing::debug!("DirectNIC export loaded: {} domain(s)", export.len());
        *cache = Some(export.clone());
        Ok(export)
    }
}

#[async_trait]
impl ProviderAdapter for DirectNicAdapter {
    async fn fetch_domain_list(&self, _credentials: &Credentials) -> Result<Vec<String>> {
        Ok(self.export().await?.domain_names())
    }

    async fn fetch_domain_details(&self, _credentials: &Credentials, domain: &str) -> Result<DomainRecord> {
        tracing::debug!("loading domain details for: {}", domain);
        let export = self.export().await?;

        match export.get(domain) {
            Some(row) => Ok(row.to_record()),
            None => {
                tracing::warn!(domain, "Domain not present in DirectNIC export");
                Ok(DomainRecord::unknown(domain))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating DirectNIC adapters
pub struct DirectNicFactory;

impl ProviderAdapterFactory for DirectNicFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        _settings: &SchedulerConfig,
    ) -> Result<(Arc<dyn ProviderAdapter>, Credentials)> {
        match config {
            ProviderConfig::Directnic { csv_path } => {
                if csv_path.as_os_str().is_empty() {
                    return Err(Error::config("DirectNIC CSV path cannot be empty"));
                }
                tracing::info!("DirectNIC adapter created for {}", csv_path.display());
                Ok((Arc::new(DirectNicAdapter::new(csv_path.clone())), Credentials::None))
            }
            _ => Err(Error::config("Invalid config for DirectNIC adapter")),
        }
    }
}

/// Register the DirectNIC adapter with an adapter registry
pub fn register(registry: &domsync_core::AdapterRegistry) {
    registry.register_adapter("directnic", Box::new(DirectNicFactory));
}
