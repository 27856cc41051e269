//! Public mainnet block engine endpoints

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockEngineRegion {
    Amsterdam,
    Frankfurt,
    NewYork,
    Tokyo,
}

impl BlockEngineRegion {
    pub const ALL: [BlockEngineRegion; 4] = [
        BlockEngineRegion::Amsterdam,
        BlockEngineRegion::Frankfurt,
        BlockEngineRegion::NewYork,
        BlockEngineRegion::Tokyo,
    ];

    /// Look up a region by its short code (`AMS`, `FRA`, `NYC`, `TKO`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AMS" => Some(Self::Amsterdam),
            "FRA" => Some(Self::Frankfurt),
            "NYC" => Some(Self::NewYork),
            "TKO" => Some(Self::Tokyo),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Amsterdam => "AMS",
            Self::Frankfurt => "FRA",
            Self::NewYork => "NYC",
            Self::Tokyo => "TKO",
        }
    }

    pub fn url(self) -> &'static str {
        match self {
            Self::Amsterdam => "https://amsterdam.mainnet.block-engine.jito.wtf",
            Self::Frankfurt => "https://frankfurt.mainnet.block-engine.jito.wtf",
            Self::NewYork => "https://ny.mainnet.block-engine.jito.wtf",
            Self::Tokyo => "https://tokyo.mainnet.block-engine.jito.wtf",
        }
    }
}

impl fmt::Display for BlockEngineRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BlockEngineRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unknown block engine region '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Endpoint, Scheme};

    #[test]
    fn test_codes() {
        assert_eq!(BlockEngineRegion::from_code("NYC"), Some(BlockEngineRegion::NewYork));
        assert_eq!(BlockEngineRegion::from_code("nyc"), None);
        assert_eq!(BlockEngineRegion::from_code("LAX"), None);
        assert!("SFO".parse::<BlockEngineRegion>().is_err());

        for region in BlockEngineRegion::ALL {
            assert_eq!(BlockEngineRegion::from_code(region.code()), Some(region));
        }
    }

    #[test]
    fn test_urls_parse_as_tls_endpoints() {
        for region in BlockEngineRegion::ALL {
            let endpoint = Endpoint::parse(region.url()).unwrap();
            assert_eq!(endpoint.scheme(), Scheme::Tls);
            assert_eq!(endpoint.port(), 443);
        }
    }
}
