/// Expanded/collapsed state of the reasoning and output panels.
///
/// In exclusive mode every mutation leaves exactly one panel expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelState {
    reasoning_expanded: bool,
    output_expanded: bool,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            reasoning_expanded: false,
            output_expanded: true,
        }
    }
}

impl PanelState {
    /// Layout at the start of a run, before any delta has arrived.
    pub fn for_run(reasoning_requested: bool, exclusive: bool) -> Self {
        if exclusive {
            Self {
                reasoning_expanded: reasoning_requested,
                output_expanded: !reasoning_requested,
            }
        } else {
            Self {
                reasoning_expanded: reasoning_requested,
                output_expanded: true,
            }
        }
    }

    pub fn reasoning_expanded(&self) -> bool {
        self.reasoning_expanded
    }

    pub fn output_expanded(&self) -> bool {
        self.output_expanded
    }

    pub(crate) fn focus_reasoning(&mut self) {
        self.reasoning_expanded = true;
        self.output_expanded = false;
    }

    pub(crate) fn focus_output(&mut self) {
        self.reasoning_expanded = false;
        self.output_expanded = true;
    }

    pub(crate) fn toggle_reasoning(&mut self, exclusive: bool) {
        self.reasoning_expanded = !self.reasoning_expanded;
        if exclusive {
            self.output_expanded = !self.reasoning_expanded;
        }
    }

    pub(crate) fn toggle_output(&mut self, exclusive: bool) {
        self.output_expanded = !self.output_expanded;
        if exclusive {
            self.reasoning_expanded = !self.output_expanded;
        }
    }
}
