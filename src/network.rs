//! Block network owned by one resource: the instances plus their event,
//! data and adapter connection tables. Wiring is only possible before the
//! owning resource starts; afterwards the network moves onto its thread.

use crate::block::instance::{BlockRuntime, DataDest, EventDest};
use crate::block::{BlockAddr, BlockId, FunctionBlock, ResourceId};
use crate::error::ConfigError;
use crate::spec::{InterfaceHandle, PortId, PortSpec};

pub struct Network {
    resource: ResourceId,
    blocks: Vec<BlockRuntime>,
}

impl Network {
    pub(crate) fn new(resource: ResourceId) -> Self {
        Self {
            resource,
            blocks: Vec::new(),
        }
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Adds an instance and returns its index within this resource.
    pub fn add_block(&mut self, body: Box<dyn FunctionBlock>) -> BlockId {
        let id = BlockId(self.blocks.len());
        let addr = BlockAddr {
            resource: self.resource,
            block: id,
        };
        self.blocks.push(BlockRuntime::new(body, addr));
        tracing::debug!(block = %addr, "block added");
        id
    }

    pub fn block_spec(&self, id: BlockId) -> Result<&PortSpec, ConfigError> {
        self.block(id).map(BlockRuntime::spec)
    }

    pub(crate) fn block_handle(&self, id: BlockId) -> Result<InterfaceHandle, ConfigError> {
        self.block(id).map(BlockRuntime::spec_handle)
    }

    fn block(&self, id: BlockId) -> Result<&BlockRuntime, ConfigError> {
        self.blocks.get(id.0).ok_or(ConfigError::UnknownBlock(id.0))
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut BlockRuntime, ConfigError> {
        self.blocks
            .get_mut(id.0)
            .ok_or(ConfigError::UnknownBlock(id.0))
    }

    /// Appends an event connection from `src`'s output `out` to `dest`.
    /// Destinations fire in the order they were wired.
    pub(crate) fn push_event_conn(
        &mut self,
        src: BlockId,
        out: PortId,
        dest: EventDest,
    ) -> Result<(), ConfigError> {
        let block = self.block_mut(src)?;
        match block.event_conns.get_mut(out as usize) {
            Some(conns) => {
                conns.push(dest);
                Ok(())
            }
            None => Err(ConfigError::UnknownPort(format!("event output #{out}"))),
        }
    }

    /// Appends a data connection from `src`'s data output `out` to `dest`.
    pub(crate) fn push_data_conn(
        &mut self,
        src: BlockId,
        out: PortId,
        dest: DataDest,
    ) -> Result<(), ConfigError> {
        let block = self.block_mut(src)?;
        match block.data_conns.get_mut(out as usize) {
            Some(conns) => {
                conns.push(dest);
                Ok(())
            }
            None => Err(ConfigError::UnknownPort(format!("data output #{out}"))),
        }
    }

    /// Appends an adapter route from `src`'s adapter/event pair to `dest`.
    pub(crate) fn push_adapter_conn(
        &mut self,
        src: BlockId,
        adapter: PortId,
        event: PortId,
        dest: EventDest,
    ) -> Result<(), ConfigError> {
        let block = self.block_mut(src)?;
        if block.spec().adapter(adapter).is_none() {
            return Err(ConfigError::UnknownPort(format!("adapter #{adapter}")));
        }
        block
            .adapter_conns
            .entry((adapter, event))
            .or_default()
            .push(dest);
        Ok(())
    }

    /// Interface handles of every block, in block-index order.
    pub(crate) fn block_handles(&self) -> Vec<InterfaceHandle> {
        self.blocks.iter().map(BlockRuntime::spec_handle).collect()
    }

    pub(crate) fn into_blocks(self) -> Vec<BlockRuntime> {
        self.blocks
    }
}
