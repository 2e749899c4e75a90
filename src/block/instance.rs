use ahash::AHashMap;

use crate::block::behavior::{Fired, FunctionBlock, LifecycleCtx, Reaction};
use crate::block::state::{ExecutionState, StateCommand, StateResponse};
use crate::block::{BlockAddr, BlockId, ResourceId};
use crate::exec::timer::TimerService;
use crate::exec::ExecutorHandle;
use crate::spec::{InterfaceHandle, PortId, PortSpec, Value};

/// Destination of an event connection. May live on another resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EventDest {
    pub resource: ResourceId,
    pub block: BlockId,
    pub input: PortId,
}

/// Destination of a data connection; always within the owning resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DataDest {
    pub block: BlockId,
    pub input: PortId,
}

/// Runtime record of one block instance: execution state, port values and
/// connection links. The interface descriptor is shared by reference with
/// every other instance of the type.
pub struct BlockRuntime {
    body: Box<dyn FunctionBlock>,
    spec: InterfaceHandle,
    state: ExecutionState,
    pub(crate) inputs: Vec<Value>,
    pub(crate) outputs: Vec<Value>,
    /// Per event output: connected event inputs, in wiring order.
    pub(crate) event_conns: Vec<Vec<EventDest>>,
    /// Per data output: connected data inputs, in wiring order.
    pub(crate) data_conns: Vec<Vec<DataDest>>,
    /// Adapter routes keyed by (adapter, event).
    pub(crate) adapter_conns: AHashMap<(PortId, PortId), Vec<EventDest>>,
    addr: BlockAddr,
}

impl BlockRuntime {
    pub(crate) fn new(body: Box<dyn FunctionBlock>, addr: BlockAddr) -> Self {
        let spec = body.interface();
        let inputs = spec.default_inputs();
        let outputs = spec.default_outputs();
        let event_conns = vec![Vec::new(); spec.num_event_outputs()];
        let data_conns = vec![Vec::new(); spec.num_data_outputs()];
        Self {
            body,
            spec,
            state: ExecutionState::Stopped,
            inputs,
            outputs,
            event_conns,
            data_conns,
            adapter_conns: AHashMap::new(),
            addr,
        }
    }

    pub fn spec(&self) -> &PortSpec {
        &self.spec
    }

    pub(crate) fn spec_handle(&self) -> InterfaceHandle {
        self.spec.clone()
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn addr(&self) -> BlockAddr {
        self.addr
    }

    /// Applies a lifecycle command. Accepted Stop/Kill cancel the block's
    /// pending timers; accepted Reset reinitializes port values. The body's
    /// `on_state_change` hook runs after any accepted transition.
    pub(crate) fn change_state(&mut self, cmd: StateCommand, timer: &TimerService) -> StateResponse {
        let resp = self.state.apply(cmd);
        if resp != StateResponse::Ready {
            return resp;
        }
        match cmd {
            StateCommand::Stop | StateCommand::Kill => {
                timer.unregister_timed_fb(self.addr);
            }
            StateCommand::Reset => {
                self.inputs = self.spec.default_inputs();
                self.outputs = self.spec.default_outputs();
            }
            StateCommand::Start => {}
        }
        let mut ctx = LifecycleCtx {
            timer,
            addr: self.addr,
        };
        self.body.on_state_change(cmd, &mut ctx);
        resp
    }

    /// Delivers one event input.
    ///
    /// On Stopped or Killed this performs no reaction and no state change.
    /// On Running the reaction executes synchronously; events it fires are
    /// appended to `fired` in declaration order for the chain executor.
    pub(crate) fn receive_input_event(
        &mut self,
        event: PortId,
        fired: &mut Vec<Fired>,
        timer: &TimerService,
        executor: &ExecutorHandle,
    ) -> bool {
        if self.state != ExecutionState::Running {
            tracing::debug!(block = %self.addr, event, state = ?self.state, "event ignored");
            return false;
        }
        if (event as usize) >= self.spec.num_event_inputs() {
            tracing::warn!(block = %self.addr, event, "unknown event input ignored");
            return false;
        }
        let BlockRuntime {
            body,
            spec,
            inputs,
            outputs,
            addr,
            ..
        } = self;
        let mut reaction = Reaction {
            spec: &**spec,
            inputs,
            outputs,
            fired,
            timer,
            executor,
            addr: *addr,
        };
        body.execute_event(event, &mut reaction);
        true
    }
}
