use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub identity: IdentityConfig,
    pub contact_events: ContactEventConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Length of one sampling session before the link is torn down (default: 8)
    pub scan_interval_secs: u64,
    /// Delay between two RSSI samples on a connected link (default: 1000)
    pub rssi_sample_interval_ms: u64,
    /// Upper bound on link establishment (default: 5000)
    pub connect_timeout_ms: u64,
    /// Upper bound on MTU negotiation and characteristic reads (default: 5000)
    pub read_timeout_ms: u64,
    /// Minimum gap between two connection attempts to one address (default: 15)
    pub min_connection_interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 8,
            rssi_sample_interval_ms: 1000,
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
            min_connection_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Two ASCII letters embedded in every cryptogram and identifier (default: GB)
    pub country_code: String,
    /// Registered resident id (UUID); no cryptogram can be built without it
    pub resident_id: Option<String>,
    /// Backend X25519 public key, base64
    pub server_public_key: Option<String>,
    /// Identifier signing secret, base64
    pub signing_secret: Option<String>,
}

impl IdentityConfig {
    /// The country code as the two bytes carried on the wire.
    ///
    /// Anything that is not exactly two ASCII bytes falls back to `GB`.
    pub fn country_code_bytes(&self) -> [u8; 2] {
        match self.country_code.as_bytes() {
            [a, b] if a.is_ascii() && b.is_ascii() => [*a, *b],
            _ => *b"GB",
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            country_code: "GB".to_string(),
            resident_id: None,
            server_public_key: None,
            signing_secret: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactEventConfig {
    /// Nominal duration written on each contact event update (default: 60)
    pub nominal_duration_secs: i64,
}

impl Default for ContactEventConfig {
    fn default() -> Self {
        Self {
            nominal_duration_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            scanner: ScannerConfig {
                scan_interval_secs: env::var("SCAN_INTERVAL_SECS")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()?,
                rssi_sample_interval_ms: env::var("RSSI_SAMPLE_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
                connect_timeout_ms: env::var("CONNECT_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()?,
                read_timeout_ms: env::var("READ_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()?,
                min_connection_interval_secs: env::var("MIN_CONNECTION_INTERVAL_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()?,
            },
            identity: IdentityConfig {
                country_code: env::var("COUNTRY_CODE").unwrap_or_else(|_| "GB".to_string()),
                resident_id: env::var("RESIDENT_ID").ok(),
                server_public_key: env::var("SERVER_PUBLIC_KEY").ok(),
                signing_secret: env::var("SIGNING_SECRET").ok(),
            },
            contact_events: ContactEventConfig {
                nominal_duration_secs: env::var("CONTACT_EVENT_DURATION_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            },
        })
    }
}
