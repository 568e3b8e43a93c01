pub mod media;
pub mod messages;
mod actions;
mod config;
mod metrics;
mod state;
mod value;

pub use actions::*;
pub use config::*;
pub use messages::*;
pub use metrics::{PipecatMetrics, PipecatMetricsData};
pub use state::TransportState;
pub use value::{Value, ValueError};
