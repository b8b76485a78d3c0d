use async_trait::async_trait;
use encoding_rs::Encoding;
use log::debug;
use reqwest::{Client, StatusCode};

use crate::config::{HistoryConfig, RealtimeConfig};
use crate::error::{AppError, Context};

use super::instrument::InstrumentId;
use super::request::{history_request, realtime_request, HistoryQuery};
use super::FetchResult;

/// Transport seam between the fetcher and the remote quote service.
///
/// Implementations return the decoded response text; parsing happens in
/// [`crate::fetch::decode`].
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_realtime(&self, instrument: &InstrumentId) -> FetchResult<String>;

    async fn fetch_history(&self, query: &HistoryQuery) -> FetchResult<String>;
}

/// `reqwest`-backed source for the quote line and daily history endpoints.
pub struct HttpQuoteSource {
    client: Client,
    realtime: RealtimeConfig,
    history: HistoryConfig,
    encoding: &'static Encoding,
}

impl HttpQuoteSource {
    pub fn new(realtime: RealtimeConfig, history: HistoryConfig) -> FetchResult<Self> {
        let encoding = Encoding::for_label(realtime.encoding.as_bytes()).ok_or_else(|| {
            AppError::message(format!("Unknown response encoding `{}`", realtime.encoding))
        })?;
        let client = Client::builder()
            .connect_timeout(realtime.connect_timeout())
            .build()
            .context("Failed to construct quote HTTP client")?;

        Ok(Self {
            client,
            realtime,
            history,
            encoding,
        })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_realtime(&self, instrument: &InstrumentId) -> FetchResult<String> {
        let request = realtime_request(&self.realtime, instrument)?;
        debug!("GET {}", request.url);

        let response = self
            .client
            .get(&request.url)
            .headers(request.headers)
            .timeout(self.realtime.timeout())
            .send()
            .await?;
        ensure_success(response.status(), instrument.as_str())?;

        let bytes = response.bytes().await?;
        let (text, _, had_errors) = self.encoding.decode(&bytes);
        if had_errors {
            debug!(
                "quote body for {} contained bytes invalid in {}",
                instrument,
                self.encoding.name()
            );
        }

        if let Some(marker) = &self.realtime.firewall_marker {
            if text.contains(marker.as_str()) {
                return Err(AppError::network(format!(
                    "Request for {} was blocked by firewall",
                    instrument
                )));
            }
        }

        Ok(text.into_owned())
    }

    async fn fetch_history(&self, query: &HistoryQuery) -> FetchResult<String> {
        let request = history_request(&self.history, query)?;
        debug!("GET {}", request.url);

        let response = self
            .client
            .get(&request.url)
            .headers(request.headers)
            .timeout(self.history.timeout())
            .send()
            .await?;
        ensure_success(response.status(), query.instrument.as_str())?;

        Ok(response.text().await?)
    }
}

fn ensure_success(status: StatusCode, code: &str) -> FetchResult<()> {
    if status.is_redirection() {
        return Err(AppError::network(format!(
            "Request for {} was redirected",
            code
        )));
    }
    if status == StatusCode::FORBIDDEN {
        return Err(AppError::network(format!(
            "Request for {} was blocked by firewall",
            code
        )));
    }
    if !status.is_success() {
        return Err(AppError::network(format!(
            "Request for {} failed with status {}",
            code, status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_gbk_body_encoding() {
        let source = HttpQuoteSource::new(RealtimeConfig::default(), HistoryConfig::default())
            .expect("source builds");
        assert_eq!(source.encoding, encoding_rs::GBK);
    }

    #[test]
    fn builds_with_configured_connect_timeout() {
        let realtime = RealtimeConfig {
            connect_timeout_secs: 2,
            ..RealtimeConfig::default()
        };
        assert_eq!(realtime.connect_timeout(), std::time::Duration::from_secs(2));
        assert!(HttpQuoteSource::new(realtime, HistoryConfig::default()).is_ok());
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let realtime = RealtimeConfig {
            encoding: "klingon".to_string(),
            ..RealtimeConfig::default()
        };
        assert!(HttpQuoteSource::new(realtime, HistoryConfig::default()).is_err());
    }

    #[test]
    fn status_mapping_yields_network_errors() {
        assert!(ensure_success(StatusCode::OK, "sh600000").is_ok());
        for status in [
            StatusCode::FOUND,
            StatusCode::FORBIDDEN,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let err = ensure_success(status, "sh600000").expect_err("non-success");
            assert!(matches!(err, AppError::Network(_)), "got {err:?}");
        }
    }

    #[test]
    fn gbk_payload_transcodes_to_utf8() {
        let (bytes, _, _) = encoding_rs::GBK.encode("var hq_str_sh600000=\"浦发银行,10.00\";");
        let (text, _, had_errors) = encoding_rs::GBK.decode(&bytes);
        assert!(!had_errors);
        assert!(text.contains("浦发银行"));
    }
}
