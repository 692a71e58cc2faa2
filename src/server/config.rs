/// HTTP listener settings.
///
/// Populated by the binary from CLI flags / environment; tests use
/// [`ServerConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8001`).
    pub port: u16,
    /// Whole-request timeout in seconds (default: `300`).
    ///
    /// Covers rasterisation plus every per-page vision call of an upload.
    pub request_timeout_secs: u64,
    /// Largest accepted request body (default: 50 MiB).
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8001,
            request_timeout_secs: 300,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
