/// How a model treats the reasoning flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningSupport {
    /// Reasoning is optional; the user decides.
    Optional,
    /// The model cannot reason; the flag is forced off.
    Unsupported,
    /// The model always reasons; the flag is forced on.
    Mandatory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub reasoning: ReasoningSupport,
}

/// What the reasoning checkbox shows, which is also what gets sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasoningControl {
    pub checked: bool,
    pub locked: bool,
}

impl ReasoningControl {
    pub fn resolve(support: Option<ReasoningSupport>, user_choice: bool) -> Self {
        match support {
            Some(ReasoningSupport::Mandatory) => Self {
                checked: true,
                locked: true,
            },
            Some(ReasoningSupport::Unsupported) => Self {
                checked: false,
                locked: true,
            },
            Some(ReasoningSupport::Optional) | None => Self {
                checked: user_choice,
                locked: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
    selected: Option<String>,
}

impl ModelCatalog {
    /// Loads the list and selects `default_model`, else the first entry.
    pub fn load(&mut self, models: Vec<ModelInfo>, default_model: &str) {
        self.selected = models
            .iter()
            .find(|model| model.id == default_model)
            .or_else(|| models.first())
            .map(|model| model.id.clone());
        self.models = models;
    }

    /// Returns false and leaves the selection alone for unknown ids.
    pub fn select(&mut self, id: &str) -> bool {
        if self.models.iter().any(|model| model.id == id) {
            self.selected = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<&ModelInfo> {
        let id = self.selected.as_deref()?;
        self.models.iter().find(|model| model.id == id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }
}
