use serde::Deserialize;

/// Main configuration structure for Threadbare
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub miner: MinerConfig,
}

/// Miner behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    /// Root URL of the forum to mine
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum number of concurrently running crawl tasks
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Whether to read/write the raw page cache
    #[serde(rename = "cache-pages", default)]
    pub cache_pages: bool,

    /// Root directory for persisted records (a per-domain folder is created inside)
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}
