mod common;
mod odometer;
mod queue;
mod sync;
mod trip;
mod watch;

pub use common::{client_config, resolve_db_path};
pub use odometer::{run_last_odometer, run_reading};
pub use queue::{run_queue_list, run_queue_prune};
pub use sync::run_sync;
pub use trip::run_trip_add;
pub use watch::run_watch;

#[cfg(test)]
pub(crate) use common::{default_db_path, format_queue_lines, open_queue};
#[cfg(test)]
pub(crate) use queue::prune_queue;
#[cfg(test)]
pub(crate) use trip::submit_trip;
