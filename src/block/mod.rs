//! Block instances: the execution-state machine, the reaction contract
//! implemented by block bodies, and the per-instance runtime record.

pub use behavior::{FunctionBlock, LifecycleCtx, Reaction};
pub use instance::BlockRuntime;
pub use state::{ExecutionState, StateCommand, StateResponse};

pub(crate) mod behavior;
pub(crate) mod instance;
mod state;

use std::fmt;

/// Index of a resource within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

/// Index of a block within its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// Device-wide address of one block instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockAddr {
    pub resource: ResourceId,
    pub block: BlockId,
}

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource.0, self.block.0)
    }
}
