//! Terminal rendering of the view model.
//!
//! The live view (status, expanded panels) goes to one writer, normally
//! stderr. The final recognized text is written once to another, normally
//! stdout, so the result can be piped.

use std::io::{self, Write};

use ocr_core::{AppViewModel, RunId, RunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Reasoning,
    Output,
}

/// Tracks what has already been printed so each render only appends.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    status: String,
    reasoning_printed: String,
    output_printed: String,
    current_panel: Option<Panel>,
    result_written_for: Option<RunId>,
}

impl TerminalRenderer {
    pub fn render(
        &mut self,
        view: &AppViewModel,
        live: &mut impl Write,
        result: &mut impl Write,
    ) -> io::Result<()> {
        if view.reasoning_expanded {
            self.append(Panel::Reasoning, &view.reasoning, live)?;
        }
        if view.output_expanded {
            self.append(Panel::Output, &view.output, live)?;
        }

        if view.status_text != self.status {
            if self.current_panel.take().is_some() {
                writeln!(live)?;
            }
            writeln!(live, "[{}]", view.status_text)?;
            self.status = view.status_text.clone();
        }

        if view.run_state == RunState::Done
            && !view.output.is_empty()
            && self.result_written_for != Some(view.run_id)
        {
            writeln!(result, "{}", view.output)?;
            result.flush()?;
            self.result_written_for = Some(view.run_id);
        }
        live.flush()
    }

    /// Prints the part of `text` not yet shown for `panel`.
    fn append(&mut self, panel: Panel, text: &str, live: &mut impl Write) -> io::Result<()> {
        let printed = match panel {
            Panel::Reasoning => &mut self.reasoning_printed,
            Panel::Output => &mut self.output_printed,
        };
        // A new run or the final marker-stripped text: start over silently.
        if !text.starts_with(printed.as_str()) {
            printed.clear();
        }
        let fresh = &text[printed.len()..];
        if fresh.is_empty() {
            return Ok(());
        }

        if self.current_panel != Some(panel) {
            if self.current_panel.is_some() {
                writeln!(live)?;
            }
            let title = match panel {
                Panel::Reasoning => "--- reasoning ---",
                Panel::Output => "--- output ---",
            };
            writeln!(live, "{title}")?;
            self.current_panel = Some(panel);
        }
        write!(live, "{fresh}")?;
        printed.push_str(fresh);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view(status: &str) -> AppViewModel {
        AppViewModel {
            status_text: status.to_string(),
            output_expanded: true,
            ..AppViewModel::default()
        }
    }

    fn render(renderer: &mut TerminalRenderer, view: &AppViewModel) -> (String, String) {
        let mut live = Vec::new();
        let mut result = Vec::new();
        renderer.render(view, &mut live, &mut result).unwrap();
        (
            String::from_utf8(live).unwrap(),
            String::from_utf8(result).unwrap(),
        )
    }

    #[test]
    fn only_new_text_of_expanded_panels_is_printed() {
        let mut renderer = TerminalRenderer::default();
        let mut state = view("Thinking...");
        state.run_state = RunState::Processing;
        state.reasoning_expanded = true;
        state.output_expanded = false;
        state.reasoning = "Look".to_string();
        let (live, _) = render(&mut renderer, &state);
        assert_eq!(live, "--- reasoning ---\nLook\n[Thinking...]\n");

        state.reasoning.push_str("ing");
        state.output = "hidden".to_string();
        let (live, _) = render(&mut renderer, &state);
        // The status line interrupted the panel, so its title is repeated.
        assert_eq!(live, "--- reasoning ---\ning");
    }

    #[test]
    fn final_text_goes_to_the_result_writer_once() {
        let mut renderer = TerminalRenderer::default();
        let mut state = view("Processing...");
        state.run_id = 1;
        state.run_state = RunState::Processing;
        state.output = "<|begin_of_box|>Hi".to_string();
        render(&mut renderer, &state);

        state.run_state = RunState::Done;
        state.status_text = "Done".to_string();
        state.output = "Hi".to_string();
        let (live, result) = render(&mut renderer, &state);
        assert_eq!(live, "--- output ---\nHi\n[Done]\n");
        assert_eq!(result, "Hi\n");

        let (_, again) = render(&mut renderer, &state);
        assert_eq!(again, "");
    }

    #[test]
    fn empty_result_writes_nothing_to_the_result_writer() {
        let mut renderer = TerminalRenderer::default();
        let mut state = view("Done (no text recognized)");
        state.run_state = RunState::Done;
        let (live, result) = render(&mut renderer, &state);
        assert_eq!(live, "[Done (no text recognized)]\n");
        assert_eq!(result, "");
    }
}
