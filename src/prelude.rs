pub use crate::block::{
    BlockAddr, BlockId, ExecutionState, FunctionBlock, LifecycleCtx, Reaction, ResourceId,
    StateCommand, StateResponse,
};
pub use crate::config::{DeviceConfig, ResourceConfig};
pub use crate::control::CommandInput;
pub use crate::device::{Device, DeviceRegistry};
pub use crate::error::{ChainOverflow, ConfigError, LifecycleError, SpecError};
pub use crate::exec::TimerService;
pub use crate::network::Network;
pub use crate::resource::Resource;
pub use crate::spec::{
    DataInRef, DataOutRef, DataType, EventInRef, EventOutRef, InterfaceHandle, PortId, PortSpec,
    SpecBuilder, Value,
};
pub use crate::utils::logger::LoggerConfig;
