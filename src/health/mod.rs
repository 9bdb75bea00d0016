//! Health checking: probing, batching, cycle orchestration and selection

pub mod batch;
pub mod import;
pub mod orchestrator;
pub mod probe;
pub mod selection;
pub mod staleness;

pub use batch::BatchProber;
pub use import::{parse_proxy_list, HttpImportSource, ImportSource};
pub use orchestrator::{CycleHandle, CyclePermit, PreparedCycle, RefreshOrchestrator};
pub use probe::{HealthProbe, HttpHealthProbe, ProbeResponse};
pub use staleness::STALENESS_TTL;
