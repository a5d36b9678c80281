use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A scanned filesystem entry that passed the size and protected-path filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
    pub is_dir: bool,
}

impl FileRecord {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Importance {
    Low,
    Medium,
    High,
}

impl Importance {
    pub const ALL: [Importance; 3] = [Importance::Low, Importance::Medium, Importance::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Low => "Low",
            Importance::Medium => "Medium",
            Importance::High => "High",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact, case-sensitive match on the tier name as the oracle spells it.
impl FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Importance::Low),
            "Medium" => Ok(Importance::Medium),
            "High" => Ok(Importance::High),
            other => Err(format!("unknown importance tier '{}'", other)),
        }
    }
}

/// The oracle's verdict on a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub important: bool,
    pub importance: Importance,
    pub reason: String,
}

impl Classification {
    /// Conservative verdict used whenever the oracle's answer cannot be trusted.
    /// Always keeps the file.
    pub fn fail_safe(reason: impl Into<String>) -> Self {
        Self {
            important: true,
            importance: Importance::High,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: FileRecord,
    pub classification: Classification,
}

impl ClassifiedRecord {
    pub fn new(record: FileRecord, classification: Classification) -> Self {
        Self {
            record,
            classification,
        }
    }

    pub fn importance(&self) -> Importance {
        self.classification.importance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_parse_is_exact() {
        assert_eq!("Low".parse::<Importance>(), Ok(Importance::Low));
        assert_eq!("High".parse::<Importance>(), Ok(Importance::High));
        assert!("low".parse::<Importance>().is_err());
        assert!("Critical".parse::<Importance>().is_err());
    }

    #[test]
    fn test_fail_safe_keeps_file() {
        let c = Classification::fail_safe("API error: timeout");
        assert!(c.important);
        assert_eq!(c.importance, Importance::High);
        assert_eq!(c.reason, "API error: timeout");
    }

    #[test]
    fn test_size_mb() {
        let record = FileRecord {
            path: PathBuf::from("/tmp/x"),
            size_bytes: 3 * 1024 * 1024,
            modified: Local::now(),
            is_dir: false,
        };
        assert!((record.size_mb() - 3.0).abs() < f64::EPSILON);
    }
}
