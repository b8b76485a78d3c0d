use crate::error::{AppError, Result};
use crate::fetch::request::template_placeholders;

use super::{ChartConfig, FeedConfig, HistoryConfig, InstrumentRules, RealtimeConfig};

const REALTIME_PLACEHOLDERS: &[&str] = &["code"];
const HISTORY_PLACEHOLDERS: &[&str] = &["code", "start", "end", "limit", "adjust"];

/// Validate a loaded configuration and surface every issue at once.
pub fn validate_config(config: &FeedConfig) -> Result<()> {
    let mut issues = Vec::new();

    validate_realtime(&config.realtime, &mut issues);
    validate_history(&config.history, &mut issues);
    validate_chart(&config.chart, &mut issues);
    validate_instrument_rules(&config.instrument, &mut issues);

    if config.polling.interval_ms == 0 {
        issues.push("polling.interval_ms must be greater than zero".to_string());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::Config(issues.join("\n  - ")))
    }
}

fn validate_realtime(realtime: &RealtimeConfig, issues: &mut Vec<String>) {
    validate_template(
        "realtime.url_template",
        &realtime.url_template,
        REALTIME_PLACEHOLDERS,
        issues,
    );

    if encoding_rs::Encoding::for_label(realtime.encoding.as_bytes()).is_none() {
        issues.push(format!(
            "realtime.encoding `{}` is not a known encoding label",
            realtime.encoding
        ));
    }

    if realtime.timeout_secs == 0 {
        issues.push("realtime.timeout_secs must be greater than zero".to_string());
    }
    if realtime.connect_timeout_secs == 0 {
        issues.push("realtime.connect_timeout_secs must be greater than zero".to_string());
    }
}

fn validate_history(history: &HistoryConfig, issues: &mut Vec<String>) {
    validate_template(
        "history.url_template",
        &history.url_template,
        HISTORY_PLACEHOLDERS,
        issues,
    );

    if history.page_size == 0 {
        issues.push("history.page_size must be greater than zero".to_string());
    }
    if history.timeout_secs == 0 {
        issues.push("history.timeout_secs must be greater than zero".to_string());
    }
}

fn validate_template(label: &str, template: &str, allowed: &[&str], issues: &mut Vec<String>) {
    if template.trim().is_empty() {
        issues.push(format!("{label} must not be empty"));
        return;
    }

    match template_placeholders(template) {
        Ok(keys) => {
            if !keys.iter().any(|key| key == "code") {
                issues.push(format!("{label} should reference `{{code}}`"));
            }
            for key in keys.iter().filter(|key| !allowed.contains(&key.as_str())) {
                issues.push(format!("{label} uses unknown placeholder `{{{key}}}`"));
            }
        }
        Err(err) => issues.push(format!("{label}: {err}")),
    }
}

fn validate_chart(chart: &ChartConfig, issues: &mut Vec<String>) {
    if chart.window_capacity == 0 {
        issues.push("chart.window_capacity must be greater than zero".to_string());
    }
    if chart.visible_bars == 0 {
        issues.push("chart.visible_bars must be greater than zero".to_string());
    }
    if chart.max_ticks == 0 {
        issues.push("chart.max_ticks must be greater than zero".to_string());
    }
    if !chart.margin_ratio.is_finite() || chart.margin_ratio < 0.0 {
        issues.push(format!(
            "chart.margin_ratio must be a non-negative number, got {}",
            chart.margin_ratio
        ));
    }
}

fn validate_instrument_rules(rules: &InstrumentRules, issues: &mut Vec<String>) {
    if rules.prefixes.is_empty() {
        issues.push("instrument.prefixes must list at least one market".to_string());
    }
    for prefix in &rules.prefixes {
        if prefix.len() != 2 || !prefix.chars().all(|ch| ch.is_ascii_lowercase()) {
            issues.push(format!(
                "instrument prefix `{prefix}` must be two lowercase letters"
            ));
        }
    }
    if rules.digits == 0 {
        issues.push("instrument.digits must be greater than zero".to_string());
    }
}
