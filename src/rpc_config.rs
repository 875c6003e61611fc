//! Public, transport-agnostic session configuration.
//!
//! This type intentionally contains no connection concepts (URLs, TLS,
//! keep-alive). Those belong to whoever builds the transport.

/// Session configuration.
///
/// # Example
///
/// ```
/// use rocketchat_realtime::RealtimeConfig;
///
/// let config = RealtimeConfig::new("support-bot")
///     .with_protocol_version("1")
///     .with_supported_versions(["1", "pre2"]);
///
/// assert_eq!(config.supported_versions, vec!["1", "pre2"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    // ---
    /// Identifier of this session, used only in log lines.
    pub client_id: String,

    /// DDP version proposed in the `connect` handshake.
    ///
    /// Default: `"1"`
    pub protocol_version: String,

    /// DDP versions advertised as supported in the handshake.
    ///
    /// Default: `["1"]`
    pub supported_versions: Vec<String>,
}

impl RealtimeConfig {
    /// Create a config with protocol defaults.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            protocol_version: "1".to_string(),
            supported_versions: vec!["1".to_string()],
        }
    }

    /// Set the proposed protocol version.
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Set the advertised supported versions.
    pub fn with_supported_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_versions = versions.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::new("realtime")
    }
}
