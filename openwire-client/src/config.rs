//! Client configuration: builders and broker URI parsing.
//!
//! Connections are configured either programmatically through
//! [`FailoverConfigBuilder`] or from an ActiveMQ-style URI string:
//!
//! ```text
//! tcp://broker:61616?wireFormat.tightEncodingEnabled=false
//! failover:(tcp://a:61616,tcp://b:61616)?randomize=false&maxReconnectAttempts=10
//! ```
//!
//! Query values may reference environment variables as `${VAR}`; they are
//! resolved once at parse time and an unset variable is a configuration
//! error, not a silent default.

use std::time::Duration;

use openwire_core::wireformat::{WireFormatOptions, MAX_SUPPORTED_VERSION};
use openwire_core::{OpenWireError, Result};
use url::Url;

/// Default delay before the first reconnect attempt.
const DEFAULT_INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(10);
/// Default upper bound on the reconnect backoff.
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
/// Default backoff multiplier.
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Default per-attempt dial timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default handshake timeout.
const DEFAULT_NEGOTIATE_TIMEOUT: Duration = Duration::from_secs(15);
/// Default bound on commands queued while disconnected.
const DEFAULT_MAX_ASYNC_SEND_BACKLOG: usize = 1024;
/// Default replay-cache budget for non-transacted messages, in bytes.
const DEFAULT_MAX_CACHE_SIZE: usize = 128 * 1024;

/// A parsed `tcp://` broker endpoint plus its wire format options.
#[derive(Debug, Clone)]
pub struct BrokerUri {
    host: String,
    port: u16,
    wire_format: WireFormatOptions,
}

impl BrokerUri {
    /// Parses a single `tcp://host:port` URI with optional `wireFormat.*`
    /// query options.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = substitute_env(uri)?;
        let url = Url::parse(&uri)
            .map_err(|e| OpenWireError::Configuration(format!("invalid URI '{}': {}", uri, e)))?;

        match url.scheme() {
            "tcp" => {}
            "ssl" => {
                return Err(OpenWireError::Configuration(
                    "ssl:// transport is not supported".to_string(),
                ))
            }
            other => {
                return Err(OpenWireError::Configuration(format!(
                    "unsupported transport scheme '{}'",
                    other
                )))
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| {
                OpenWireError::Configuration(format!("missing host in URI '{}'", uri))
            })?
            .to_string();
        let port = url.port().ok_or_else(|| {
            OpenWireError::Configuration(format!("missing port in URI '{}'", uri))
        })?;

        let mut wire_format = WireFormatOptions::default();
        for (key, value) in url.query_pairs() {
            apply_wire_format_option(&mut wire_format, &key, &value)?;
        }

        Ok(Self {
            host,
            port,
            wire_format,
        })
    }

    /// Returns the broker host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the wire format options to offer this broker.
    pub fn wire_format(&self) -> &WireFormatOptions {
        &self.wire_format
    }

    /// Returns the `host:port` dial string.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for BrokerUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

impl PartialEq for BrokerUri {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for BrokerUri {}

fn apply_wire_format_option(
    options: &mut WireFormatOptions,
    key: &str,
    value: &str,
) -> Result<()> {
    let field = key.strip_prefix("wireFormat.").ok_or_else(|| {
        OpenWireError::Configuration(format!("unknown URI option '{}'", key))
    })?;
    match field {
        "version" => {
            let version = parse_number(key, value)?;
            if !(1..=MAX_SUPPORTED_VERSION).contains(&version) {
                return Err(OpenWireError::Configuration(format!(
                    "wireFormat.version {} out of supported range 1..={}",
                    version, MAX_SUPPORTED_VERSION
                )));
            }
            options.version = version;
        }
        "tightEncodingEnabled" => options.tight_encoding_enabled = parse_bool(key, value)?,
        "sizePrefixDisabled" => options.size_prefix_disabled = parse_bool(key, value)?,
        "cacheEnabled" => options.cache_enabled = parse_bool(key, value)?,
        "cacheSize" => options.cache_size = parse_number(key, value)?,
        "stackTraceEnabled" => options.stack_trace_enabled = parse_bool(key, value)?,
        "tcpNoDelayEnabled" => options.tcp_no_delay_enabled = parse_bool(key, value)?,
        "maxInactivityDuration" => options.max_inactivity_duration = parse_number(key, value)?,
        "maxInactivityDurationInitalDelay" | "maxInactivityDurationInitialDelay" => {
            options.max_inactivity_duration_initial_delay = parse_number(key, value)?
        }
        _ => {
            return Err(OpenWireError::Configuration(format!(
                "unknown URI option '{}'",
                key
            )))
        }
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value.parse().map_err(|_| {
        OpenWireError::Configuration(format!("option '{}' expects true/false, got '{}'", key, value))
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        OpenWireError::Configuration(format!("option '{}' has invalid value '{}'", key, value))
    })
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    Ok(Duration::from_millis(parse_number(key, value)?))
}

/// Resolves `${VAR}` references against the process environment.
///
/// An unterminated reference or unset variable is a configuration error.
fn substitute_env(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            OpenWireError::Configuration(format!(
                "unterminated environment reference in '{}'",
                input
            ))
        })?;
        let name = &after[..end];
        let value = std::env::var(name).map_err(|_| {
            OpenWireError::Configuration(format!("environment variable '{}' is not set", name))
        })?;
        result.push_str(&value);
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

/// Configuration for the failover transport.
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    uris: Vec<BrokerUri>,
    randomize: bool,
    initial_reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    use_exponential_backoff: bool,
    backoff_multiplier: f64,
    max_reconnect_attempts: u32,
    startup_max_reconnect_attempts: u32,
    timeout: Option<Duration>,
    backup: bool,
    backup_pool_size: usize,
    track_messages: bool,
    max_cache_size: usize,
    max_async_send_backlog: usize,
    connect_timeout: Duration,
    negotiate_timeout: Duration,
}

impl FailoverConfig {
    /// Returns a builder with defaults.
    pub fn builder() -> FailoverConfigBuilder {
        FailoverConfigBuilder::new()
    }

    /// Parses a failover configuration from a broker URI.
    ///
    /// Accepts `failover:(uri,…)?options`, `failover://(uri,…)?options`, and
    /// a bare `tcp://` URI, which becomes a single-member pool.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let uri = substitute_env(uri)?;

        if let Some(rest) = uri
            .strip_prefix("failover://")
            .or_else(|| uri.strip_prefix("failover:"))
        {
            let (inner, query) = split_composite(rest, &uri)?;
            let mut builder = FailoverConfigBuilder::new();
            for part in inner.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                builder = builder.add_uri(BrokerUri::parse(part)?);
            }
            if let Some(query) = query {
                builder = builder.apply_query(query)?;
            }
            builder.build()
        } else {
            FailoverConfigBuilder::new()
                .add_uri(BrokerUri::parse(&uri)?)
                .build()
        }
    }

    /// Returns the configured broker URIs in declaration order.
    pub fn uris(&self) -> &[BrokerUri] {
        &self.uris
    }

    /// Returns whether the pool is shuffled before use.
    pub fn randomize(&self) -> bool {
        self.randomize
    }

    /// Returns the delay before the first reconnect attempt.
    pub fn initial_reconnect_delay(&self) -> Duration {
        self.initial_reconnect_delay
    }

    /// Returns the backoff ceiling.
    pub fn max_reconnect_delay(&self) -> Duration {
        self.max_reconnect_delay
    }

    /// Returns whether the reconnect delay grows exponentially.
    pub fn use_exponential_backoff(&self) -> bool {
        self.use_exponential_backoff
    }

    /// Returns the backoff multiplier.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Returns the reconnect attempt limit; 0 means unlimited.
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// Returns the attempt limit for the very first connection; 0 falls back
    /// to [`FailoverConfig::max_reconnect_attempts`].
    pub fn startup_max_reconnect_attempts(&self) -> u32 {
        self.startup_max_reconnect_attempts
    }

    /// Returns how long an application send may block while disconnected;
    /// `None` blocks until reconnection succeeds or fails permanently.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns whether warm backup connections are maintained.
    pub fn backup(&self) -> bool {
        self.backup
    }

    /// Returns the number of backup connections to keep warm.
    pub fn backup_pool_size(&self) -> usize {
        self.backup_pool_size
    }

    /// Returns whether non-transacted messages are cached for replay.
    pub fn track_messages(&self) -> bool {
        self.track_messages
    }

    /// Returns the replay-cache budget in bytes.
    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    /// Returns the bound on commands queued while disconnected.
    pub fn max_async_send_backlog(&self) -> usize {
        self.max_async_send_backlog
    }

    /// Returns the per-attempt dial timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the wire format handshake timeout.
    pub fn negotiate_timeout(&self) -> Duration {
        self.negotiate_timeout
    }
}

fn split_composite<'a>(rest: &'a str, full: &str) -> Result<(&'a str, Option<&'a str>)> {
    if let Some(inner_start) = rest.strip_prefix('(') {
        let close = inner_start.rfind(')').ok_or_else(|| {
            OpenWireError::Configuration(format!("unbalanced parentheses in '{}'", full))
        })?;
        let inner = &inner_start[..close];
        let tail = &inner_start[close + 1..];
        let query = match tail.strip_prefix('?') {
            Some(query) => Some(query),
            None if tail.is_empty() => None,
            None => {
                return Err(OpenWireError::Configuration(format!(
                    "unexpected trailing characters in '{}'",
                    full
                )))
            }
        };
        Ok((inner, query))
    } else {
        // Bare form: failover:tcp://a:1,tcp://b:2?options. The query binds
        // to the composite, not the last member.
        match rest.split_once('?') {
            Some((inner, query)) => Ok((inner, Some(query))),
            None => Ok((rest, None)),
        }
    }
}

/// Builder for [`FailoverConfig`].
#[derive(Debug, Clone)]
pub struct FailoverConfigBuilder {
    uris: Vec<BrokerUri>,
    randomize: bool,
    initial_reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    use_exponential_backoff: bool,
    backoff_multiplier: f64,
    max_reconnect_attempts: u32,
    startup_max_reconnect_attempts: u32,
    timeout: Option<Duration>,
    backup: bool,
    backup_pool_size: usize,
    track_messages: bool,
    max_cache_size: usize,
    max_async_send_backlog: usize,
    connect_timeout: Duration,
    negotiate_timeout: Duration,
}

impl FailoverConfigBuilder {
    /// Creates a builder with defaults.
    pub fn new() -> Self {
        Self {
            uris: Vec::new(),
            randomize: true,
            initial_reconnect_delay: DEFAULT_INITIAL_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            use_exponential_backoff: true,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_reconnect_attempts: 0,
            startup_max_reconnect_attempts: 0,
            timeout: None,
            backup: false,
            backup_pool_size: 1,
            track_messages: true,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            max_async_send_backlog: DEFAULT_MAX_ASYNC_SEND_BACKLOG,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            negotiate_timeout: DEFAULT_NEGOTIATE_TIMEOUT,
        }
    }

    /// Adds a broker to the pool.
    pub fn add_uri(mut self, uri: BrokerUri) -> Self {
        self.uris.push(uri);
        self
    }

    /// Sets whether the pool is shuffled before use.
    pub fn randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Sets the delay before the first reconnect attempt.
    pub fn initial_reconnect_delay(mut self, delay: Duration) -> Self {
        self.initial_reconnect_delay = delay;
        self
    }

    /// Sets the backoff ceiling.
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets whether the reconnect delay grows exponentially.
    pub fn use_exponential_backoff(mut self, enabled: bool) -> Self {
        self.use_exponential_backoff = enabled;
        self
    }

    /// Sets the backoff multiplier.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the reconnect attempt limit; 0 means unlimited.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the attempt limit for the very first connection.
    pub fn startup_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.startup_max_reconnect_attempts = attempts;
        self
    }

    /// Bounds how long an application send may block while disconnected.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables warm backup connections.
    pub fn backup(mut self, enabled: bool) -> Self {
        self.backup = enabled;
        self
    }

    /// Sets the number of backup connections to keep warm.
    pub fn backup_pool_size(mut self, size: usize) -> Self {
        self.backup_pool_size = size;
        self
    }

    /// Sets whether non-transacted messages are cached for replay.
    pub fn track_messages(mut self, enabled: bool) -> Self {
        self.track_messages = enabled;
        self
    }

    /// Sets the replay-cache budget in bytes.
    pub fn max_cache_size(mut self, bytes: usize) -> Self {
        self.max_cache_size = bytes;
        self
    }

    /// Bounds the number of commands queued while disconnected.
    pub fn max_async_send_backlog(mut self, limit: usize) -> Self {
        self.max_async_send_backlog = limit;
        self
    }

    /// Sets the per-attempt dial timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the wire format handshake timeout.
    pub fn negotiate_timeout(mut self, timeout: Duration) -> Self {
        self.negotiate_timeout = timeout;
        self
    }

    fn apply_query(mut self, query: &str) -> Result<Self> {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                OpenWireError::Configuration(format!("malformed query option '{}'", pair))
            })?;
            self = match key {
                "randomize" => self.randomize(parse_bool(key, value)?),
                "initialReconnectDelay" => {
                    self.initial_reconnect_delay(parse_millis(key, value)?)
                }
                "maxReconnectDelay" => self.max_reconnect_delay(parse_millis(key, value)?),
                "useExponentialBackOff" => self.use_exponential_backoff(parse_bool(key, value)?),
                "backOffMultiplier" => self.backoff_multiplier(parse_number(key, value)?),
                "maxReconnectAttempts" => self.max_reconnect_attempts(parse_number(key, value)?),
                "startupMaxReconnectAttempts" => {
                    self.startup_max_reconnect_attempts(parse_number(key, value)?)
                }
                "timeout" => self.timeout(parse_millis(key, value)?),
                "backup" => self.backup(parse_bool(key, value)?),
                "backupPoolSize" => self.backup_pool_size(parse_number(key, value)?),
                "trackMessages" => self.track_messages(parse_bool(key, value)?),
                "maxCacheSize" => self.max_cache_size(parse_number(key, value)?),
                "transport.maxAsyncSendBacklog" => {
                    self.max_async_send_backlog(parse_number(key, value)?)
                }
                "connectTimeout" => self.connect_timeout(parse_millis(key, value)?),
                _ => {
                    return Err(OpenWireError::Configuration(format!(
                        "unknown URI option '{}'",
                        key
                    )))
                }
            };
        }
        Ok(self)
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<FailoverConfig> {
        if self.uris.is_empty() {
            return Err(OpenWireError::Configuration(
                "failover configuration needs at least one broker URI".to_string(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(OpenWireError::Configuration(format!(
                "backOffMultiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.backup_pool_size == 0 {
            return Err(OpenWireError::Configuration(
                "backupPoolSize must be at least 1".to_string(),
            ));
        }
        Ok(FailoverConfig {
            uris: self.uris,
            randomize: self.randomize,
            initial_reconnect_delay: self.initial_reconnect_delay,
            max_reconnect_delay: self.max_reconnect_delay,
            use_exponential_backoff: self.use_exponential_backoff,
            backoff_multiplier: self.backoff_multiplier,
            max_reconnect_attempts: self.max_reconnect_attempts,
            startup_max_reconnect_attempts: self.startup_max_reconnect_attempts,
            timeout: self.timeout,
            backup: self.backup,
            backup_pool_size: self.backup_pool_size,
            track_messages: self.track_messages,
            max_cache_size: self.max_cache_size,
            max_async_send_backlog: self.max_async_send_backlog,
            connect_timeout: self.connect_timeout,
            negotiate_timeout: self.negotiate_timeout,
        })
    }
}

impl Default for FailoverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_tcp_uri() {
        let uri = BrokerUri::parse("tcp://broker.example.com:61616").unwrap();
        assert_eq!(uri.host(), "broker.example.com");
        assert_eq!(uri.port(), 61616);
        assert_eq!(uri.authority(), "broker.example.com:61616");
    }

    #[test]
    fn test_parse_wire_format_options() {
        let uri = BrokerUri::parse(
            "tcp://localhost:61616?wireFormat.tightEncodingEnabled=false&wireFormat.version=5&wireFormat.maxInactivityDuration=10000",
        )
        .unwrap();
        assert!(!uri.wire_format().tight_encoding_enabled);
        assert_eq!(uri.wire_format().version, 5);
        assert_eq!(uri.wire_format().max_inactivity_duration, 10_000);
    }

    #[test]
    fn test_parse_rejects_unknown_option() {
        let err = BrokerUri::parse("tcp://localhost:61616?bogusOption=1").unwrap_err();
        assert!(matches!(err, OpenWireError::Configuration(_)));
        assert!(err.to_string().contains("bogusOption"));
    }

    #[test]
    fn test_parse_rejects_ssl() {
        let err = BrokerUri::parse("ssl://localhost:61617").unwrap_err();
        assert!(err.to_string().contains("ssl"));
    }

    #[test]
    fn test_parse_rejects_version_out_of_range() {
        let err =
            BrokerUri::parse("tcp://localhost:61616?wireFormat.version=99").unwrap_err();
        assert!(matches!(err, OpenWireError::Configuration(_)));
    }

    #[test]
    fn test_failover_uri_with_options() {
        let config = FailoverConfig::from_uri(
            "failover:(tcp://a:61616,tcp://b:61617)?randomize=false&maxReconnectAttempts=7&initialReconnectDelay=50&backup=true",
        )
        .unwrap();
        assert_eq!(config.uris().len(), 2);
        assert_eq!(config.uris()[0].host(), "a");
        assert_eq!(config.uris()[1].port(), 61617);
        assert!(!config.randomize());
        assert_eq!(config.max_reconnect_attempts(), 7);
        assert_eq!(config.initial_reconnect_delay(), Duration::from_millis(50));
        assert!(config.backup());
    }

    #[test]
    fn test_failover_uri_double_slash_form() {
        let config =
            FailoverConfig::from_uri("failover://(tcp://a:61616)?randomize=false").unwrap();
        assert_eq!(config.uris().len(), 1);
        assert!(!config.randomize());
    }

    #[test]
    fn test_failover_uri_bare_list() {
        let config =
            FailoverConfig::from_uri("failover:tcp://a:61616,tcp://b:61617?timeout=2000").unwrap();
        assert_eq!(config.uris().len(), 2);
        assert_eq!(config.timeout(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_plain_uri_becomes_single_member_pool() {
        let config = FailoverConfig::from_uri("tcp://solo:61616").unwrap();
        assert_eq!(config.uris().len(), 1);
        assert_eq!(config.uris()[0].host(), "solo");
    }

    #[test]
    fn test_failover_uri_inner_wire_format_options() {
        let config = FailoverConfig::from_uri(
            "failover:(tcp://a:61616?wireFormat.tightEncodingEnabled=false,tcp://b:61617)",
        )
        .unwrap();
        assert!(!config.uris()[0].wire_format().tight_encoding_enabled);
        assert!(config.uris()[1].wire_format().tight_encoding_enabled);
    }

    #[test]
    fn test_failover_uri_unknown_option_rejected() {
        let err =
            FailoverConfig::from_uri("failover:(tcp://a:61616)?nope=true").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_failover_uri_unbalanced_parens() {
        let err = FailoverConfig::from_uri("failover:(tcp://a:61616").unwrap_err();
        assert!(err.to_string().contains("parentheses"));
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("OPENWIRE_TEST_HOST", "envhost");
        let uri = BrokerUri::parse("tcp://${OPENWIRE_TEST_HOST}:61616").unwrap();
        assert_eq!(uri.host(), "envhost");
    }

    #[test]
    fn test_env_substitution_in_query() {
        std::env::set_var("OPENWIRE_TEST_ATTEMPTS", "3");
        let config = FailoverConfig::from_uri(
            "failover:(tcp://a:61616)?maxReconnectAttempts=${OPENWIRE_TEST_ATTEMPTS}",
        )
        .unwrap();
        assert_eq!(config.max_reconnect_attempts(), 3);
    }

    #[test]
    fn test_env_substitution_unset_variable_fails() {
        let err =
            BrokerUri::parse("tcp://${OPENWIRE_TEST_DEFINITELY_UNSET_VAR}:61616").unwrap_err();
        assert!(matches!(err, OpenWireError::Configuration(_)));
        assert!(err.to_string().contains("OPENWIRE_TEST_DEFINITELY_UNSET_VAR"));
    }

    #[test]
    fn test_env_substitution_unterminated_fails() {
        let err = BrokerUri::parse("tcp://${OPENWIRE_TEST_HOST:61616").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_builder_validation() {
        assert!(FailoverConfigBuilder::new().build().is_err());

        let err = FailoverConfigBuilder::new()
            .add_uri(BrokerUri::parse("tcp://a:1").unwrap())
            .backoff_multiplier(0.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("backOffMultiplier"));

        let err = FailoverConfigBuilder::new()
            .add_uri(BrokerUri::parse("tcp://a:1").unwrap())
            .backup_pool_size(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("backupPoolSize"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = FailoverConfigBuilder::new()
            .add_uri(BrokerUri::parse("tcp://a:1").unwrap())
            .build()
            .unwrap();
        assert!(config.randomize());
        assert_eq!(config.max_reconnect_attempts(), 0);
        assert!(config.use_exponential_backoff());
        assert_eq!(config.backup_pool_size(), 1);
        assert!(config.track_messages());
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_broker_uri_equality_ignores_options() {
        let a = BrokerUri::parse("tcp://x:1?wireFormat.version=2").unwrap();
        let b = BrokerUri::parse("tcp://x:1").unwrap();
        assert_eq!(a, b);
    }
}
