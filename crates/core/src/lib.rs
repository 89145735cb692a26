pub mod call_policy;
pub mod config;
pub mod config_loader;
pub mod diff;
pub mod error;
pub mod events;
pub mod formatter;
pub mod monitor;
pub mod position;
pub mod traits;

pub use call_policy::CallPolicy;
pub use config::{AppConfig, EmailConfig, HyperliquidConfig, MonitorConfig, StoreBackend, StoreConfig};
pub use config_loader::ConfigLoader;
pub use diff::{SnapshotDiffer, DEFAULT_SIZE_EPSILON};
pub use error::MonitorError;
pub use events::{ChangeEvent, ChangeKind, PositionChange};
pub use formatter::{Notification, NotificationFormatter};
pub use monitor::{DeliveryMode, MonitorSettings, PositionMonitor, RunReport};
pub use position::{Direction, Position, Snapshot, StoredSnapshot};
pub use traits::{Notifier, PositionSource, StateStore};
