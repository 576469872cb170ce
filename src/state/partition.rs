use std::fmt;

/// Store partition a reference lives in
///
/// QUEUED, ACTIVE and PROCESSED are the live lifecycle states of the
/// current run and are mutually exclusive. CACHED holds the previous run's
/// processed entries and may overlap with any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Queued,
    Active,
    Processed,
    Cached,
}

impl Partition {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Processed => "processed",
            Self::Cached => "cached",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "active" => Some(Self::Active),
            "processed" => Some(Self::Processed),
            "cached" => Some(Self::Cached),
            _ => None,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string().to_uppercase())
    }
}
