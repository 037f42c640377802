pub mod entropy;
pub mod error;
pub mod fields;
pub mod locale;
pub mod notify;
pub mod registry;
pub mod session;
pub mod timer;
pub mod workflow;

// Re-export commonly used types
pub use entropy::Entropy;
pub use error::{AcquisitionFailure, FlowError, Result};
pub use fields::{FieldStore, is_filled, section_weight};
pub use locale::{Catalog, Localizer};
pub use notify::{Notice, Notification, NotificationSink, Notifier, RecordingSink, Severity, TracingSink};
pub use registry::SessionRegistry;
pub use session::{FlowConfig, RequestId, Stage, WorkflowSession, WorkflowSnapshot, WorkflowState};
pub use timer::{ScopedTask, start_countdown};
pub use workflow::{Tick, Workflow};
