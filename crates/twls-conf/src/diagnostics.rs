use std::collections::HashMap;

use serde::Deserialize;
use twls_source::Severity;

/// Severity override for a diagnostic code, as written in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Off,
    Error,
    Warning,
    Info,
    Hint,
}

impl DiagnosticSeverity {
    /// `None` for `Off`: the diagnostic should not be shown.
    #[must_use]
    pub fn to_severity(self) -> Option<Severity> {
        match self {
            DiagnosticSeverity::Off => None,
            DiagnosticSeverity::Error => Some(Severity::Error),
            DiagnosticSeverity::Warning => Some(Severity::Warning),
            DiagnosticSeverity::Info => Some(Severity::Info),
            DiagnosticSeverity::Hint => Some(Severity::Hint),
        }
    }
}

/// Per-code severity overrides.
///
/// Diagnostics keep their own severity unless configured. Keys are exact
/// codes or code prefixes; the exact code wins, then the longest prefix.
///
/// ```toml
/// [diagnostics.severity]
/// "R" = "off"       # no resolution diagnostics
/// R102 = "error"    # except inheritance cycles
/// R100 = "hint"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub severity: HashMap<String, DiagnosticSeverity>,
}

impl DiagnosticsConfig {
    /// The configured override for `code`, if any. Codes and patterns
    /// compare case-insensitively.
    ///
    /// ```
    /// # use twls_conf::diagnostics::{DiagnosticsConfig, DiagnosticSeverity};
    /// # use std::collections::HashMap;
    /// let mut severity = HashMap::new();
    /// severity.insert("R".to_string(), DiagnosticSeverity::Warning);
    /// severity.insert("R1".to_string(), DiagnosticSeverity::Off);
    /// severity.insert("R100".to_string(), DiagnosticSeverity::Error);
    ///
    /// let config = DiagnosticsConfig { severity };
    ///
    /// assert_eq!(config.get_severity("R100"), Some(DiagnosticSeverity::Error));
    /// assert_eq!(config.get_severity("R101"), Some(DiagnosticSeverity::Off));
    /// assert_eq!(config.get_severity("R200"), Some(DiagnosticSeverity::Warning));
    /// assert_eq!(config.get_severity("T100"), None);
    /// ```
    #[must_use]
    pub fn get_severity(&self, code: &str) -> Option<DiagnosticSeverity> {
        let code = code.to_ascii_uppercase();
        let mut best_match: Option<(usize, DiagnosticSeverity)> = None;

        for (pattern, &severity) in &self.severity {
            let pattern = pattern.to_ascii_uppercase();
            if pattern == code {
                return Some(severity);
            }
            if code.starts_with(&pattern)
                && best_match.is_none_or(|(length, _)| pattern.len() > length)
            {
                best_match = Some((pattern.len(), severity));
            }
        }

        best_match.map(|(_, severity)| severity)
    }

    /// Effective severity of a diagnostic whose own severity is `default`;
    /// `None` if it is switched off.
    #[must_use]
    pub fn effective_severity(&self, code: &str, default: Severity) -> Option<Severity> {
        match self.get_severity(code) {
            Some(configured) => configured.to_severity(),
            None => Some(default),
        }
    }

    pub fn set_severity(&mut self, code: &str, severity: DiagnosticSeverity) {
        self.severity
            .retain(|pattern, _| !pattern.eq_ignore_ascii_case(code));
        self.severity.insert(code.to_string(), severity);
    }

    #[must_use]
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_severity(code) != Some(DiagnosticSeverity::Off)
    }
}
