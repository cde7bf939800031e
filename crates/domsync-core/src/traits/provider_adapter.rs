// # Provider Adapter Trait
//
// Defines the interface for fetching and normalizing one registrar's
// domain data.
//
// ## Implementations
//
// - EuroDNS (live XML API): `domsync-provider-eurodns` crate
// - DirectNIC (static CSV export): `domsync-provider-directnic` crate
//
// ## Usage
//
// ```rust,ignore
// use domsync_core::{Credentials, ProviderAdapter};
//
// async fn sync(adapter: &dyn ProviderAdapter, credentials: &Credentials) {
//     let list = adapter.list_domains(credentials).await;
//     for name in &list.names {
//         let record = adapter.get_domain_details(credentials, name).await;
//         println!("{} expires {:?}", record.domain, record.expiration);
//     }
// }
// ```

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::legacy;

/// Normalized result of a provider query for one domain
///
/// `None` means the provider had nothing to say about the field; it is
/// written as the legacy sentinel only when the record is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Domain name
    pub domain: String,
    /// Expiration date
    #[serde(with = "crate::legacy::date")]
    pub expiration: Option<NaiveDate>,
    /// DNS servers, 1–10 entries; the placeholder pair when none are known
    pub dns_servers: Vec<String>,
    /// WHOIS privacy enabled
    pub privacy: Option<bool>,
    /// Auto-renewal enabled
    pub auto_renew: Option<bool>,
}

impl DomainRecord {
    /// A record for a domain the provider has no data for
    pub fn unknown(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            expiration: None,
            dns_servers: legacy::placeholder_dns(),
            privacy: None,
            auto_renew: None,
        }
    }

    /// Whether the provider returned anything for this domain
    pub fn is_unknown(&self) -> bool {
        self.expiration.is_none()
            && self.privacy.is_none()
            && self.auto_renew.is_none()
            && legacy::is_placeholder_dns(&self.dns_servers)
    }

    /// Field values in the legacy storage encoding
    pub fn to_legacy(&self) -> LegacyDomainFields {
        LegacyDomainFields {
            domain: self.domain.clone(),
            expiry_date: legacy::encode_date(self.expiration),
            dns_servers: self.dns_servers.clone(),
            privacy: legacy::encode_optional_flag(self.privacy),
            autorenew: legacy::encode_optional_flag(self.auto_renew),
        }
    }
}

/// A [`DomainRecord`] in the column encoding of the domain tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyDomainFields {
    pub domain: String,
    pub expiry_date: String,
    pub dns_servers: Vec<String>,
    pub privacy: &'static str,
    pub autorenew: &'static str,
}

/// Result of listing an account's domains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainList {
    /// Number of domains
    pub count: usize,
    /// Domain names, in provider order
    pub names: Vec<String>,
}

impl DomainList {
    /// Build a list from names
    pub fn new(names: Vec<String>) -> Self {
        Self {
            count: names.len(),
            names,
        }
    }

    /// The `(0, [])` failure result
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Credentials for one provider account
///
/// Opaque to the scheduler. The Debug implementation never shows secrets.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// API key and secret
    Api {
        /// API key (account identifier)
        key: String,
        /// API secret
        secret: String,
    },
    /// The adapter reads a local export and needs no credentials
    None,
}

impl Credentials {
    /// API credentials
    pub fn api(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::Api {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Account identifier safe for logs
    pub fn account_label(&self) -> String {
        match self {
            Self::Api { key, .. } => obfuscate(key),
            Self::None => "-".to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api { key, .. } => f
                .debug_struct("Api")
                .field("key", &obfuscate(key))
                .field("secret", &"<REDACTED>")
                .finish(),
            Self::None => f.write_str("None"),
        }
    }
}

/// Mask a credential for diagnostics
///
/// Values of eight characters or fewer are fully masked; longer values keep
/// their first and last two characters.
pub fn obfuscate(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
}

/// Trait for registrar adapters
///
/// Implementors provide the two fallible `fetch_*` methods. The provided
/// [`list_domains`](ProviderAdapter::list_domains) and
/// [`get_domain_details`](ProviderAdapter::get_domain_details) wrap them so
/// that no single failed fetch ever reaches the caller as an error: failures
/// are logged with obfuscated credentials and degrade to an empty list or an
/// unknown-valued record.
///
/// # Adapter Rules
///
/// - Only talk to the adapter's own upstream (HTTP endpoint or export file)
/// - No retries, no scheduling decisions, no task-state access
/// - Never log secrets; use [`obfuscate`]
/// - Bound every network call with a timeout
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Fetch the account's domain names
    async fn fetch_domain_list(&self, credentials: &Credentials) -> crate::Result<Vec<String>>;

    /// Fetch and normalize one domain
    ///
    /// Returns `Ok(DomainRecord::unknown(..))` when the provider answered
    /// but holds no record for the domain.
    async fn fetch_domain_details(
        &self,
        credentials: &Credentials,
        domain: &str,
    ) -> crate::Result<DomainRecord>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// List the account's domains; `(0, [])` on any failure
    async fn list_domains(&self, credentials: &Credentials) -> DomainList {
        match self.fetch_domain_list(credentials).await {
            Ok(names) => {
                tracing::debug!("{}: listed {} domain(s)", self.provider_name(), names.len());
                DomainList::new(names)
            }
            Err(e) => {
                tracing::error!(
                    provider = self.provider_name(),
                    account = %credentials.account_label(),
                    "Unable to get domain list: {}",
                    e
                );
                DomainList::empty()
            }
        }
    }

    /// Fetch one domain; an unknown-valued record on any failure
    async fn get_domain_details(&self, credentials: &Credentials, domain: &str) -> DomainRecord {
        match self.fetch_domain_details(credentials, domain).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(
                    provider = self.provider_name(),
                    account = %credentials.account_label(),
                    domain,
                    "Unable to get domain details: {}",
                    e
                );
                DomainRecord::unknown(domain)
            }
        }
    }
}

/// Helper trait for constructing adapters from configuration
pub trait ProviderAdapterFactory: Send + Sync {
    /// Create an adapter and the credentials it should be called with
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        settings: &crate::config::SchedulerConfig,
    ) -> crate::Result<(std::sync::Arc<dyn ProviderAdapter>, Credentials)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_record_uses_placeholders() {
        let record = DomainRecord::unknown("example.com");
        assert!(record.is_unknown());
        assert_eq!(record.dns_servers, ["no.dns-servers.1", "no.dns-servers.2"]);

        let legacy = record.to_legacy();
        assert_eq!(legacy.expiry_date, "1978-01-23");
        assert_eq!(legacy.privacy, "");
        assert_eq!(legacy.autorenew, "");
    }

    #[test]
    fn confirmed_values_are_not_unknown() {
        let record = DomainRecord {
            domain: "example.com".to_string(),
            expiration: None,
            dns_servers: legacy::placeholder_dns(),
            privacy: Some(false),
            auto_renew: Some(false),
        };
        assert!(!record.is_unknown());
        assert_eq!(record.to_legacy().privacy, "0");
    }

    #[test]
    fn secrets_not_exposed_in_debug() {
        let creds = Credentials::api("reseller-account-42", "super-secret-value");
        let debug_str = format!("{:?}", creds);
        assert!(!debug_str.contains("super-secret-value"));
        assert!(!debug_str.contains("reseller-account-42"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn obfuscation() {
        assert_eq!(obfuscate("short"), "*****");
        assert_eq!(obfuscate("abcdefghij"), "ab******ij");
        assert_eq!(obfuscate(""), "");
    }
}
