use super::state::PhaseName;

pub struct PhaseDefinition {
    pub name: PhaseName,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// Phases in execution order.
pub static PHASES: &[PhaseDefinition] = &[
    PhaseDefinition {
        name: PhaseName::Authenticate,
        display_name: "Authenticate",
        description: "Verify the operator's wiki credentials",
    },
    PhaseDefinition {
        name: PhaseName::Discovery,
        display_name: "Discovery",
        description: "Reconcile the live page list against stored pages",
    },
    PhaseDefinition {
        name: PhaseName::Audit,
        display_name: "Audit",
        description: "Scan candidate pages for images without alternate text",
    },
    PhaseDefinition {
        name: PhaseName::Authorship,
        display_name: "Authorship",
        description: "Assign recent authors, apply exclusions and reassign stale pages",
    },
    PhaseDefinition {
        name: PhaseName::Compose,
        display_name: "Compose",
        description: "Render one notification per responsible author",
    },
    PhaseDefinition {
        name: PhaseName::Notify,
        display_name: "Notify",
        description: "Deliver the composed notifications",
    },
    PhaseDefinition {
        name: PhaseName::Reset,
        display_name: "Reset",
        description: "Clear task flags and per-run page markers",
    },
];

pub fn definition(name: PhaseName) -> Option<&'static PhaseDefinition> {
    PHASES.iter().find(|p| p.name == name)
}
