use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::{HistoryConfig, RealtimeConfig};
use crate::error::{AppError, Context};
use crate::utils::time::DATE_FMT;

use super::instrument::InstrumentId;
use super::FetchResult;

#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: HeaderMap,
}

/// Time-ranged daily bar query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub instrument: InstrumentId,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryQuery {
    pub fn new(instrument: InstrumentId, start: NaiveDate, end: NaiveDate) -> FetchResult<Self> {
        if start > end {
            return Err(AppError::validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self {
            instrument,
            start,
            end,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Text(String),
    Key(String),
}

pub fn realtime_request(
    config: &RealtimeConfig,
    instrument: &InstrumentId,
) -> FetchResult<PreparedRequest> {
    let replacements = HashMap::from([("code", instrument.as_str().to_string())]);

    Ok(PreparedRequest {
        url: render_template(&config.url_template, &replacements)?,
        headers: build_headers(&config.headers)?,
    })
}

pub fn history_request(
    config: &HistoryConfig,
    query: &HistoryQuery,
) -> FetchResult<PreparedRequest> {
    let replacements = HashMap::from([
        ("code", query.instrument.as_str().to_string()),
        ("start", query.start.format(DATE_FMT).to_string()),
        ("end", query.end.format(DATE_FMT).to_string()),
        ("limit", config.page_size.to_string()),
        ("adjust", config.adjustment.clone()),
    ]);

    Ok(PreparedRequest {
        url: render_template(&config.url_template, &replacements)?,
        headers: build_headers(&config.headers)?,
    })
}

/// Names of every `{placeholder}` in the template, in order of appearance.
pub fn template_placeholders(template: &str) -> FetchResult<Vec<String>> {
    Ok(parse_template(template)?
        .into_iter()
        .filter_map(|part| match part {
            TemplatePart::Key(key) => Some(key),
            TemplatePart::Text(_) => None,
        })
        .collect())
}

fn parse_template(template: &str) -> FetchResult<Vec<TemplatePart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            text.push(ch);
            continue;
        }

        let mut key = String::new();
        let mut closed = false;
        while let Some(&next) = chars.peek() {
            chars.next();
            if next == '}' {
                closed = true;
                break;
            }
            key.push(next);
        }

        if !closed {
            return Err(AppError::message(format!(
                "Unterminated placeholder in template: {{{key}"
            )));
        }

        if key.is_empty() {
            return Err(AppError::message(
                "Encountered empty placeholder `{}` in template",
            ));
        }

        if !text.is_empty() {
            parts.push(TemplatePart::Text(std::mem::take(&mut text)));
        }
        parts.push(TemplatePart::Key(key));
    }

    if !text.is_empty() {
        parts.push(TemplatePart::Text(text));
    }
    Ok(parts)
}

fn render_template(template: &str, replacements: &HashMap<&str, String>) -> FetchResult<String> {
    let mut result = String::with_capacity(template.len());

    for part in parse_template(template)? {
        match part {
            TemplatePart::Text(text) => result.push_str(&text),
            TemplatePart::Key(key) => {
                let value = replacements.get(key.as_str()).ok_or_else(|| {
                    AppError::message(format!(
                        "No replacement provided for placeholder `{}` in template",
                        key
                    ))
                })?;
                result.push_str(value);
            }
        }
    }

    Ok(result)
}

fn build_headers(headers: &HashMap<String, String>) -> FetchResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("Invalid header name: {}", key))?;
        let header_value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid header value for {}", key))?;
        map.insert(name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstrumentRules;

    fn instrument() -> InstrumentId {
        InstrumentId::parse("sh600000", &InstrumentRules::default()).expect("valid id")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn renders_realtime_url_and_headers() {
        let request = realtime_request(&RealtimeConfig::default(), &instrument()).unwrap();

        assert_eq!(request.url, "http://hq.sinajs.cn/list=sh600000");
        assert_eq!(
            request.headers.get("referer").and_then(|v| v.to_str().ok()),
            Some("http://finance.sina.com.cn/")
        );
    }

    #[test]
    fn renders_history_url() {
        let query = HistoryQuery::new(instrument(), date(2024, 1, 2), date(2024, 3, 29)).unwrap();
        let request = history_request(&HistoryConfig::default(), &query).unwrap();

        assert_eq!(
            request.url,
            "http://web.ifzq.gtimg.cn/appstock/app/fqkline/get?param=sh600000,day,2024-01-02,2024-03-29,100,qfq"
        );
    }

    #[test]
    fn inverted_range_is_a_validation_error() {
        let err = HistoryQuery::new(instrument(), date(2024, 3, 1), date(2024, 2, 1))
            .expect_err("range must be rejected");
        assert!(err.is_validation());
    }

    #[test]
    fn lists_placeholders() {
        let keys = template_placeholders("http://x/{code}?a={start}&b={end}").unwrap();
        assert_eq!(keys, vec!["code", "start", "end"]);
    }

    #[test]
    fn unterminated_placeholder_fails() {
        assert!(template_placeholders("http://x/{code").is_err());
    }
}
