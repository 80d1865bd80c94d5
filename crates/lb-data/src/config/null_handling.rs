//! Null value handling for data loading

use serde::{Serialize, Deserialize};

/// Cell values that load as missing (NaN)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Patterns to treat as null
    pub patterns: Vec<String>,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                String::new(),
                "NA".to_string(),
                "N/A".to_string(),
                "null".to_string(),
                "None".to_string(),
                "-".to_string(),
            ],
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    /// Check if a value should be treated as null. Surrounding whitespace is ignored.
    pub fn is_null(&self, value: &str) -> bool {
        let value = value.trim();
        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                value == pattern
            } else {
                value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// Parse a cell: `Some(NaN)` for nulls, `None` when it is not a number
    pub fn parse(&self, value: &str) -> Option<f64> {
        if self.is_null(value) {
            return Some(f64::NAN);
        }
        value.trim().parse::<f64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_tokens() {
        let nulls = NullConfig::default();
        assert!(nulls.is_null(""));
        assert!(nulls.is_null("  n/a "));
        assert!(nulls.is_null("NULL"));
        assert!(!nulls.is_null("0"));

        assert!(nulls.parse("na").unwrap().is_nan());
        assert_eq!(nulls.parse(" 91.2 "), Some(91.2));
        assert_eq!(nulls.parse("muon"), None);
    }

    #[test]
    fn test_case_sensitive_patterns() {
        let nulls = NullConfig {
            patterns: vec!["NA".into()],
            case_sensitive: true,
        };
        assert!(nulls.is_null("NA"));
        assert!(!nulls.is_null("na"));
        assert_eq!(nulls.parse(""), None);
    }
}
