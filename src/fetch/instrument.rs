use std::fmt;

use crate::config::InstrumentRules;
use crate::error::AppError;

use super::FetchResult;

/// Validated instrument code: a recognised market prefix followed by a
/// fixed-length run of digits, e.g. `sh600000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn parse(raw: &str, rules: &InstrumentRules) -> FetchResult<Self> {
        let code = raw.trim().to_ascii_lowercase();

        let Some(prefix) = rules
            .prefixes
            .iter()
            .find(|prefix| code.starts_with(prefix.as_str()))
        else {
            return Err(AppError::validation(format!(
                "instrument `{}` must start with one of: {}",
                raw.trim(),
                rules.prefixes.join(", ")
            )));
        };

        let digits = &code[prefix.len()..];
        if digits.len() != rules.digits || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(AppError::validation(format!(
                "instrument `{}` must end with exactly {} digits",
                raw.trim(),
                rules.digits
            )));
        }

        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
