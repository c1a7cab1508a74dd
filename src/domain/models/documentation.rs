use serde::{Deserialize, Serialize};

/// Requirements and design text injected into an agent's initial context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationBundle {
    #[serde(default)]
    pub requirements_text: String,
    #[serde(default)]
    pub design_text: String,
}

impl DocumentationBundle {
    pub fn new(requirements_text: impl Into<String>, design_text: impl Into<String>) -> Self {
        Self {
            requirements_text: requirements_text.into(),
            design_text: design_text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements_text.trim().is_empty() && self.design_text.trim().is_empty()
    }
}
