use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub mod loader;
pub mod validator;

pub use loader::ConfigOrigin;
pub use validator::validate_config;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Realtime wire variant; the two feeds quote the same fields at different offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteFormat {
    /// `var hq_str_sh600000="name,open,...";`
    Sina,
    /// `v_sh600000="1~name~code~...";`
    Tencent,
}

impl QuoteFormat {
    pub fn delimiter(self) -> char {
        match self {
            QuoteFormat::Sina => ',',
            QuoteFormat::Tencent => '~',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub format: QuoteFormat,
    /// Supports `{code}`.
    pub url_template: String,
    pub headers: HashMap<String, String>,
    /// `encoding_rs` label of the response body.
    pub encoding: String,
    pub timeout_secs: u64,
    /// TCP connect timeout of the shared HTTP client.
    pub connect_timeout_secs: u64,
    /// Body text that marks a firewall interstitial instead of a quote.
    pub firewall_marker: Option<String>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            format: QuoteFormat::Sina,
            url_template: "http://hq.sinajs.cn/list={code}".to_string(),
            headers: HashMap::from([
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Referer".to_string(), "http://finance.sina.com.cn/".to_string()),
            ]),
            encoding: "gbk".to_string(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
            firewall_marker: None,
        }
    }
}

impl RealtimeConfig {
    /// Preset for the tilde-delimited quote feed.
    pub fn tencent() -> Self {
        Self {
            format: QuoteFormat::Tencent,
            url_template: "http://qt.gtimg.cn/q={code}".to_string(),
            headers: HashMap::from([
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Referer".to_string(), "https://gu.qq.com/".to_string()),
            ]),
            encoding: "gbk".to_string(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
            firewall_marker: Some(
                "window.location.href=\"https://waf.tencent.com/501page.html?u=".to_string(),
            ),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Supports `{code}`, `{start}`, `{end}`, `{limit}` and `{adjust}`.
    pub url_template: String,
    pub headers: HashMap<String, String>,
    pub page_size: usize,
    /// Price adjustment flag, e.g. `qfq`; also prefixes the day list key.
    pub adjustment: String,
    pub timeout_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            url_template:
                "http://web.ifzq.gtimg.cn/appstock/app/fqkline/get?param={code},day,{start},{end},{limit},{adjust}"
                    .to_string(),
            headers: HashMap::from([
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Referer".to_string(), "https://gu.qq.com/".to_string()),
                ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
            ]),
            page_size: 100,
            adjustment: "qfq".to_string(),
            timeout_secs: 10,
        }
    }
}

impl HistoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn day_list_key(&self) -> String {
        format!("{}day", self.adjustment)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 5_000 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Realtime samples kept in the sliding window.
    pub window_capacity: usize,
    /// Trailing bars shown in bar mode.
    pub visible_bars: usize,
    /// Upper bound on x-axis ticks in bar mode.
    pub max_ticks: usize,
    /// Fraction of the price span added above and below the y range.
    pub margin_ratio: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            window_capacity: 50,
            visible_bars: 20,
            max_ticks: 10,
            margin_ratio: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentRules {
    /// Recognised two-letter market prefixes.
    pub prefixes: Vec<String>,
    /// Exact length of the numeric suffix.
    pub digits: usize,
}

impl Default for InstrumentRules {
    fn default() -> Self {
        Self {
            prefixes: vec!["sh".to_string(), "sz".to_string(), "bj".to_string()],
            digits: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn, error
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub realtime: RealtimeConfig,
    pub history: HistoryConfig,
    pub polling: PollingConfig,
    pub chart: ChartConfig,
    pub instrument: InstrumentRules,
    pub log: LogConfig,
}
