//! Endpoint parsing: `http(s)://host[:port]` into a dialable target

use std::fmt;
use std::str::FromStr;

use url::Url;

use super::conn_errors::ConnectionError;

/// Transport security of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Plaintext,
    Tls,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Plaintext => 80,
            Scheme::Tls => 443,
        }
    }

    fn as_uri_scheme(self) -> &'static str {
        match self {
            Scheme::Plaintext => "http",
            Scheme::Tls => "https",
        }
    }
}

/// A resolved remote address. Immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse a URL-form endpoint.
    ///
    /// `http` selects plaintext, `https` selects TLS; a missing port falls
    /// back to 80 or 443. Anything without a host is rejected.
    pub fn parse(raw: &str) -> Result<Self, ConnectionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConnectionError::invalid_endpoint(raw, "address is required"));
        }

        let url = Url::parse(raw).map_err(|e| {
            ConnectionError::invalid_endpoint(
                raw,
                format!("{e}; expected http(s)://<endpoint>:<port>"),
            )
        })?;

        let scheme = match url.scheme() {
            "http" => Scheme::Plaintext,
            "https" => Scheme::Tls,
            other => {
                return Err(ConnectionError::invalid_endpoint(
                    raw,
                    format!("unsupported scheme '{other}'"),
                ))
            }
        };

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => {
                return Err(ConnectionError::invalid_endpoint(
                    raw,
                    "missing host; expected http(s)://<endpoint>:<port>",
                ))
            }
        };

        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self {
            raw: raw.to_string(),
            scheme,
            host,
            port,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Tls
    }

    /// `host:port`
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Normalized URI with an explicit port, suitable for a transport builder
    pub fn uri(&self) -> String {
        format!("{}://{}", self.scheme.as_uri_scheme(), self.authority())
    }

    /// The string the endpoint was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Endpoint {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let plain = Endpoint::parse("http://localhost").unwrap();
        assert_eq!(plain.scheme(), Scheme::Plaintext);
        assert_eq!(plain.port(), 80);
        assert_eq!(plain.authority(), "localhost:80");

        let tls = Endpoint::parse("https://ny.mainnet.block-engine.jito.wtf").unwrap();
        assert!(tls.is_tls());
        assert_eq!(tls.port(), 443);
        assert_eq!(tls.uri(), "https://ny.mainnet.block-engine.jito.wtf:443");
    }

    #[test]
    fn test_explicit_port_wins() {
        let ep: Endpoint = "http://127.0.0.1:10000".parse().unwrap();
        assert_eq!(ep.host(), "127.0.0.1");
        assert_eq!(ep.port(), 10000);
        assert_eq!(ep.as_str(), "http://127.0.0.1:10000");
    }

    #[test]
    fn test_malformed_endpoints() {
        for raw in ["", "   ", "not-a-url", "http://", "https://:443", "unix:/tmp/sock", "ftp://host"] {
            let err = Endpoint::parse(raw).unwrap_err();
            assert!(
                matches!(err, ConnectionError::InvalidEndpoint { .. }),
                "{raw:?} produced {err:?}"
            );
        }
    }
}
