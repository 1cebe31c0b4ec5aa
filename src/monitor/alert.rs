use std::fmt;

use serde::Serialize;

/// Threshold that was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    SlowRender,
    CriticalRender,
    HighMemory,
    LowFrameRate,
    HighErrorRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// A threshold crossing reported to alert listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    /// Observed value, in the threshold's unit (ms, bytes, fps, ratio)
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

impl Alert {
    pub(crate) fn new(kind: AlertKind, value: f64, threshold: f64) -> Self {
        let severity = match kind {
            AlertKind::CriticalRender => Severity::Critical,
            _ => Severity::Warning,
        };
        let message = match kind {
            AlertKind::SlowRender => format!("render took {value:.0}ms (limit {threshold:.0}ms)"),
            AlertKind::CriticalRender => {
                format!("render took {value:.0}ms, past the critical {threshold:.0}ms")
            },
            AlertKind::HighMemory => format!("memory at {value:.0} bytes (cap {threshold:.0})"),
            AlertKind::LowFrameRate => format!("frame rate {value:.1}fps (floor {threshold:.1})"),
            AlertKind::HighErrorRate => {
                format!("error rate {:.0}% (cap {:.0}%)", value * 100.0, threshold * 100.0)
            },
        };
        Self {
            kind,
            severity,
            value,
            threshold,
            message,
        }
    }

    #[inline]
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}
