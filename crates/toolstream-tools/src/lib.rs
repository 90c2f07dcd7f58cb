pub mod error;
pub mod operation;
pub mod registry;
pub mod result;

pub use error::OperationError;
pub use operation::{DynOperation, Operation, OperationKind};
pub use registry::OperationRegistry;
pub use result::{OperationResult, OperationStatus};
