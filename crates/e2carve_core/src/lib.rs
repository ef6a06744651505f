pub mod block;
pub mod classifier;
mod error;
pub mod geometry;
pub mod layout;
pub mod recovery;
pub mod scan;
pub mod signature;
mod traits;
mod types;

pub use block::BlockAccessor;
pub use classifier::{classify, IndirectClassifier};
pub use error::{CoreError, Result};
pub use geometry::{Geometry, GeometryConfig};
pub use recovery::{RecoveryConfig, RecoveryEngine, RecoveryOutcome, RecoveryState};
pub use scan::{PartitionScanner, ScanConfig, ScanReport};
pub use signature::SignatureScanner;
pub use traits::BlockSource;
pub use types::{IndirectCandidate, IndirectKind, StartCandidate};
