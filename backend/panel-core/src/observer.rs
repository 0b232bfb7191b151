//! Hooks for the UI layer that sits on top of the broker.
//!
//! The broker calls these synchronously from its dispatcher task, so
//! implementations must return quickly.

use crate::supervisor::HelperState;

use models::{LookupTable, Rect};

use log::{debug, info};

pub trait PanelObserver: Send {
    fn on_show_candidate_table(&mut self) {}

    fn on_update_lookup_table(&mut self, _table: &LookupTable) {}

    /// Where the input panel currently is on screen.
    fn on_update_geometry_request(&mut self) -> Rect {
        Rect::default()
    }

    fn on_ise_state_changed(&mut self, _uuid: &str, _state: HelperState) {}
}

/// Observer used when no UI is attached; it only logs.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl PanelObserver for LoggingObserver {
    fn on_show_candidate_table(&mut self) {
        debug!("Candidate table shown");
    }

    fn on_update_lookup_table(&mut self, table: &LookupTable) {
        debug!(
            "Lookup table updated: {} candidates, page size {}",
            table.len(),
            table.page_size
        );
    }

    fn on_ise_state_changed(&mut self, uuid: &str, state: HelperState) {
        info!("ISE {} is now {}", uuid, state);
    }
}
