//! Session settings

use serde::{Deserialize, Serialize};

/// Tunables for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Size given to newly created plots
    pub default_plot_width: u32,
    pub default_plot_height: u32,

    /// Number of slots on the shared base filter (one per range slider)
    pub base_filter_slots: usize,

    /// Optional ceiling on the number of plots
    pub max_plots: Option<usize>,

    /// Bound of the engine command channel
    pub engine_queue_capacity: usize,

    /// Renders attempted for one image request before giving up when the
    /// plot keeps changing underneath it
    pub max_render_attempts: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_plot_width: 400,
            default_plot_height: 400,
            base_filter_slots: 4,
            max_plots: None,
            engine_queue_capacity: 64,
            max_render_attempts: 3,
        }
    }
}
