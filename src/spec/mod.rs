//! Interface specification: typed port references, the incremental
//! [`SpecBuilder`], and the compiled immutable [`PortSpec`] descriptor
//! shared by every instance of a block type.

pub use builder::{
    AdapterSpecBuilder, DataSpecBuilder, DirSelect, EventSpecBuilder, SpecBuilder, WithSpecBuilder,
    WithTarget,
};
pub use interface::{AdapterDef, InterfaceHandle, NameList, PortSpec, TypeList, WithRange};
pub use refs::{
    DataInRange, DataInRef, DataKind, DataOutRange, DataOutRef, EventInRange, EventInRef,
    EventKind, EventOutRange, EventOutRef, INVALID_PORT, InputDir, MAX_PORTS_PER_KIND, OutputDir,
    PortId, SpecRange, SpecRef,
};
pub use value::{DataType, Value};

mod builder;
mod interface;
mod refs;
mod value;
