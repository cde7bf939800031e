// # EuroDNS Adapter
//
// This crate provides the EuroDNS reseller API adapter for domsync.
//
// ## Protocol
//
// Every call is one HTTPS POST to the v2 endpoint with a form field `xml`
// holding the request document:
//
// ```xml
// <?xml version="1.0"?>
// <request xmlns:domain="http://www.eurodns.com/domain"><domain:list/></request>
// ```
//
// The account is authenticated with HTTP Basic credentials: the username is
// the API key and the password is `"MD5"` followed by the lowercase hex MD5
// of the API secret.
//
// A call succeeds only when the HTTP status is 200 and the first child of the
// response root carries `code="1000"`.
//
// ## Architectural Constraints
//
// Adapters are isolated and single-shot:
// - One HTTP request per `fetch_*` call, bounded by the configured timeout
// - No retries (a failed fetch degrades to an empty result for this run)
// - No access to task state or to other adapters
//
// ## Security Requirements
//
// - The API secret NEVER appears in logs or Debug output
// - Log lines identify the account with `obfuscate()` only

use async_trait::async_trait;
use domsync_core::config::{ProviderConfig, SchedulerConfig};
use domsync_core::normalize::{self, DateFormat, FlagConvention};
use domsync_core::traits::{Credentials, DomainRecord, ProviderAdapter, ProviderAdapterFactory};
use domsync_core::{Error, Result};
use md5::{Digest, Md5};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::sync::Arc;
use std::time::Duration;

/// EuroDNS reseller API endpoint
pub const EURODNS_API_ENDPOINT: &str = "https://secure.api-eurodns.com:20015/v2/index.php";

/// Namespace bound to the `domain:` prefix in requests
pub const DOMAIN_NAMESPACE: &str = "http://www.eurodns.com/domain";

/// Result code of a successful command
pub const SUCCESS_CODE: &str = "1000";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "eurodns";

/// `service:domainprivacy`: "No" means privacy is off
pub const PRIVACY: FlagConvention = FlagConvention::new("No", false);

/// `domain:renewal`: "autoRenew" means auto-renewal is on
pub const AUTO_RENEW: FlagConvention = FlagConvention::new("autoRenew", true);

/// Privacy flag from the `service:domainprivacy` text
pub fn process_privacy(raw: &str) -> bool {
    PRIVACY.parse(raw)
}

/// Auto-renew flag from the `domain:renewal` text
pub fn process_auto_renew(raw: &str) -> bool {
    AUTO_RENEW.parse(raw)
}

/// Basic-auth password for an API secret
pub fn auth_password(secret: &str) -> String {
    format!("MD5{}", hex::encode(Md5::digest(secret.as_bytes())))
}

/// A command understood by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `domain:list`
    List,
    /// `domain:info` for one domain
    Info(&'a str),
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::parse(format!("XML error: {}", e))
}

/// Build the request document for a command
pub fn build_request(command: Command<'_>) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("request").with_attributes([("xmlns:domain", DOMAIN_NAMESPACE)]),
        ))
        .map_err(xml_error)?;

    match command {
        Command::List => {
            writer
                .write_event(Event::Empty(BytesStart::new("domain:list")))
                .map_err(xml_error)?;
        }
        Command::Info(domain) => {
            for event in [
                Event::Start(BytesStart::new("domain:info")),
                Event::Start(BytesStart::new("domain:name")),
                Event::Text(BytesText::new(domain)),
                Event::End(BytesEnd::new("domain:name")),
                Event::End(BytesEnd::new("domain:info")),
            ] {
                writer.write_event(event).map_err(xml_error)?;
            }
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("request")))
        .map_err(xml_error)?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

/// A parsed response document
///
/// Keeps the result code and the direct text of every element, in document
/// order, keyed by qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResponse {
    /// `code` attribute of the root's first child
    pub code: Option<String>,
    elements: Vec<(String, String)>,
}

impl ApiResponse {
    /// Parse a response body
    pub fn parse(body: &str) -> Result<Self> {
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        let mut response = Self::default();
        let mut stack: Vec<(String, String)> = Vec::new();
        let mut seen_first_child = false;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if stack.len() == 1 && !seen_first_child {
                        seen_first_child = true;
                        response.code = code_attribute(&e)?;
                    }
                    stack.push((name, String::new()));
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if stack.len() == 1 && !seen_first_child {
                        seen_first_child = true;
                        response.code = code_attribute(&e)?;
                    }
                    response.elements.push((name, String::new()));
                }
                Event::Text(e) => {
                    if let Some((_, text)) = stack.last_mut() {
                        text.push_str(&e.unescape().map_err(xml_error)?);
                    }
                }
                Event::CData(e) => {
                    if let Some((_, text)) = stack.last_mut() {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        response.elements.push(element);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::parse("XML error: unclosed elements at end of document"));
        }

        Ok(response)
    }

    /// Whether the command succeeded
    pub fn is_success(&self) -> bool {
        self.code.as_deref() == Some(SUCCESS_CODE)
    }

    /// Text of every element named `name`
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.elements
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, text)| text.as_str())
    }

    /// Text of the first element named `name`
    pub fn first(&self, name: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.as_str())
    }

    /// Domain names from a `domain:list` response
    pub fn domain_names(&self) -> Vec<String> {
        self.all("domain:name")
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Normalized record from a `domain:info` response
    pub fn domain_record(&self, domain: &str) -> DomainRecord {
        DomainRecord {
            domain: domain.to_string(),
            expiration: normalize::parse_date(
                self.first("domain:expDate").unwrap_or_default(),
                DateFormat::IsoPrefix,
            ),
            dns_servers: normalize::normalize_dns_list(self.all("domain:ns")),
            privacy: Some(process_privacy(
                self.first("service:domainprivacy").unwrap_or_default(),
            )),
            auto_renew: Some(process_auto_renew(
                self.first("domain:renewal").unwrap_or_default(),
            )),
        }
    }
}

fn code_attribute(element: &BytesStart<'_>) -> Result<Option<String>> {
    match element.try_get_attribute("code").map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

/// EuroDNS adapter
///
/// Stateless apart from the HTTP client; credentials arrive with each call.
pub struct EuroDnsAdapter {
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for EuroDnsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EuroDnsAdapter")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl EuroDnsAdapter {
    /// Create an adapter for the production endpoint
    pub fn new() -> Result<Self> {
        Self::with_endpoint(EURODNS_API_ENDPOINT, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create an adapter for another endpoint (a sandbox or a local stub)
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one command and return the parsed, successful response
    async fn call(&self, credentials: &Credentials, command: Command<'_>) -> Result<ApiResponse> {
        let Credentials::Api { key, secret } = credentials else {
            return Err(Error::config("EuroDNS requires an API key and secret"));
        };

        let xml = build_request(command)?;
        tracing::debug!("Sending {:?} request to EuroDNS", command);

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(key, Some(auth_password(secret)))
            .form(&[("xml", xml)])
            .send()
            .await
            .map_err(|e| Error::unavailable(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::debug!("API HTTP Error: {}", status.as_u16());
            return Err(Error::unavailable(PROVIDER, format!("HTTP status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::unavailable(PROVIDER, format!("Failed to read response: {}", e)))?;

        let parsed = ApiResponse::parse(&body)?;
        if !parsed.is_success() {
            let code = parsed.code.clone().unwrap_or_else(|| "missing".to_string());
            tracing::debug!("API Error: {}", code);
            return Err(Error::provider_api(PROVIDER, code));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ProviderAdapter for EuroDnsAdapter {
    async fn fetch_domain_list(&self, credentials: &Credentials) -> Result<Vec<String>> {
        tracing::debug!("loading domain list");
        let names = self.call(credentials, Command::List).await?.domain_names();
        if names.is_empty() {
            return Err(Error::parse("domain list response holds no domain:name elements"));
        }
        Ok(names)
    }

    async fn fetch_domain_details(&self, credentials: &Credentials, domain: &str) -> Result<DomainRecord> {
        let response = self.call(credentials, Command::Info(domain)).await?;
        let record = response.domain_record(domain);
        tracing::debug!(
            domain,
            expiration = ?record.expiration,
            dns = ?record.dns_servers,
            privacy = ?record.privacy,
            auto_renew = ?record.auto_renew,
            "domain details"
        );
        Ok(record)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating EuroDNS adapters
pub struct EuroDnsFactory;

impl ProviderAdapterFactory for EuroDnsFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        settings: &SchedulerConfig,
    ) -> Result<(Arc<dyn ProviderAdapter>, Credentials)> {
        match config {
            ProviderConfig::Eurodns {
                api_key,
                api_secret,
                endpoint,
            } => {
                if api_key.is_empty() || api_secret.is_empty() {
                    return Err(Error::config("EuroDNS API key and secret are required"));
                }

                let endpoint = endpoint.as_deref().unwrap_or(EURODNS_API_ENDPOINT);
                let adapter = EuroDnsAdapter::with_endpoint(endpoint, settings.http_timeout())?;
                tracing::info!(
                    "EuroDNS adapter created for account {}",
                    domsync_core::traits::obfuscate(api_key)
                );

                Ok((Arc::new(adapter), Credentials::api(api_key, api_secret)))
            }
            _ => Err(Error::config("Invalid config for EuroDNS adapter")),
        }
    }
}

/// Register the EuroDNS adapter with an adapter registry
pub fn register(registry: &domsync_core::AdapterRegistry) {
    registry.register_adapter("eurodns", Box::new(EuroDnsFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response xmlns:domain="http://www.eurodns.com/domain" xmlns:service="http://www.eurodns.com/service">
  <result code="1000"><msg>Command completed successfully</msg></result>
  <resData>
    <domain:infData>
      <domain:name>example.eu</domain:name>
      <domain:expDate>2025-11-04T00:00:00.0Z</domain:expDate>
      <domain:ns>ns1.eurodns.com</domain:ns>
      <domain:ns>ns2.eurodns.com</domain:ns>
      <domain:renewal>autoRenew</domain:renewal>
      <service:domainprivacy>Yes</service:domainprivacy>
    </domain:infData>
  </resData>
</response>"#;

    #[test]
    fn list_request_document() {
        let xml = build_request(Command::List).unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0"?><request xmlns:domain="http://www.eurodns.com/domain"><domain:list/></request>"#
        );
    }

    #[test]
    fn info_request_escapes_domain() {
        let xml = build_request(Command::Info("a&b.eu")).unwrap();
        assert!(xml.contains("<domain:info><domain:name>a&amp;b.eu</domain:name></domain:info>"));
    }

    #[test]
    fn password_is_prefixed_md5_hex() {
        assert_eq!(auth_password("secret"), "MD55ebe2294ecd0e0f08eab7690d2a6ee69");
    }

    #[test]
    fn info_response_is_normalized() {
        let response = ApiResponse::parse(INFO_RESPONSE).unwrap();
        assert!(response.is_success());

        let record = response.domain_record("example.eu");
        assert_eq!(record.expiration, chrono::NaiveDate::from_ymd_opt(2025, 11, 4));
        assert_eq!(record.dns_servers, ["ns1.eurodns.com", "ns2.eurodns.com"]);
        assert_eq!(record.privacy, Some(true));
        assert_eq!(record.auto_renew, Some(true));
    }

    #[test]
    fn info_without_optional_nodes() {
        let response = ApiResponse::parse(
            r#"<response><result code="1000"/><resData><domain:renewal>manual</domain:renewal></resData></response>"#,
        )
        .unwrap();
        let record = response.domain_record("example.eu");

        assert_eq!(record.expiration, None);
        assert_eq!(record.dns_servers, ["no.dns-servers.1", "no.dns-servers.2"]);
        assert_eq!(record.privacy, Some(true));
        assert_eq!(record.auto_renew, Some(false));
    }

    #[test]
    fn result_code_comes_from_first_child() {
        let response = ApiResponse::parse(
            r#"<response><result code="2303"><msg>Object does not exist</msg></result><x code="1000"/></response>"#,
        )
        .unwrap();
        assert_eq!(response.code.as_deref(), Some("2303"));
        assert!(!response.is_success());
    }

    #[test]
    fn malformed_response_is_a_parse_error() {
        assert!(matches!(
            ApiResponse::parse("<response><result code=\"1000\">"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn flag_conventions() {
        assert!(!process_privacy("No"));
        assert!(process_privacy("no"));
        assert!(process_privacy(""));
        assert!(process_auto_renew("autoRenew"));
        assert!(!process_auto_renew("autorenew"));
        assert!(!process_auto_renew(""));
    }

    #[test]
    fn factory_creation() {
        let config = ProviderConfig::Eurodns {
            api_key: "reseller-account".to_string(),
            api_secret: "secret".to_string(),
            endpoint: Some("http://127.0.0.1:9/v2/index.php".to_string()),
        };
        let (adapter, credentials) = EuroDnsFactory
            .create(&config, &SchedulerConfig::default())
            .unwrap();
        assert_eq!(adapter.provider_name(), "eurodns");
        assert_eq!(credentials, Credentials::api("reseller-account", "secret"));
    }

    #[test]
    fn factory_rejects_empty_secret() {
        let config = ProviderConfig::Eurodns {
            api_key: "reseller-account".to_string(),
            api_secret: String::new(),
            endpoint: None,
        };
        assert!(EuroDnsFactory.create(&config, &SchedulerConfig::default()).is_err());
    }

    #[test]
    fn factory_rejects_other_config() {
        let config = ProviderConfig::Directnic {
            csv_path: "/tmp/export.csv".into(),
        };
        assert!(EuroDnsFactory.create(&config, &SchedulerConfig::default()).is_err());
    }

    #[test]
    fn debug_hides_nothing_secret() {
        let adapter = EuroDnsAdapter::new().unwrap();
        let debug_str = format!("{:?}", adapter);
        assert!(debug_str.contains(EURODNS_API_ENDPOINT));
    }

    #[test]
    fn register_adds_factory() {
        let registry = domsync_core::AdapterRegistry::new();
        register(&registry);
        assert!(registry.has_adapter("eurodns"));
    }
}
