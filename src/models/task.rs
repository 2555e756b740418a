use serde::{Deserialize, Serialize};

/// Persisted completion markers for the three resumable phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFlag {
    Discovery,
    Audit,
    Notify,
}

impl TaskFlag {
    pub const ALL: [TaskFlag; 3] = [TaskFlag::Discovery, TaskFlag::Audit, TaskFlag::Notify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Audit => "audit",
            Self::Notify => "notify",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Discovery => "Reconciled the live page listing with stored pages",
            Self::Audit => "Scanned candidate pages for images missing alternate text",
            Self::Notify => "Sent individualized messages to the assigned authors",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovery" => Some(Self::Discovery),
            "audit" => Some(Self::Audit),
            "notify" => Some(Self::Notify),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_flag_parse_roundtrip() {
        for flag in TaskFlag::ALL {
            assert_eq!(TaskFlag::parse(flag.as_str()), Some(flag));
        }
        assert_eq!(TaskFlag::parse("GOTIDS"), None);
    }

    #[test]
    fn test_task_flag_serialization() {
        let json = serde_json::to_string(&TaskFlag::Notify).unwrap();
        assert_eq!(json, "\"notify\"");
    }
}
