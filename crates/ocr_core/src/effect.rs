use std::time::Duration;

use crate::{RecognitionRequest, RunId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue the streaming recognition request for a new run.
    StartRecognition {
        run_id: RunId,
        request: RecognitionRequest,
    },
    /// Abort the in-flight request of the given run.
    CancelRecognition { run_id: RunId },
    /// Deliver `Msg::AutoSwitchElapsed` for `run_id` once `delay` has passed.
    ScheduleAutoSwitch { run_id: RunId, delay: Duration },
    /// Blocking notice for the user; state is left untouched.
    ShowAlert(String),
}
