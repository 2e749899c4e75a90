use std::time::Duration;

use crate::block::state::StateCommand;
use crate::block::BlockAddr;
use crate::exec::timer::{TimerEntry, TimerService};
use crate::exec::ExecutorHandle;
use crate::spec::{DataInRef, DataOutRef, EventInRef, EventOutRef, InterfaceHandle, PortId, PortSpec, Value};

/// Event fired by a reaction, recorded in declaration order and propagated
/// by the chain executor after the callback returns.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Fired {
    Output(PortId),
    Adapter { adapter: PortId, event: PortId },
}

/// Contract implemented by block bodies.
///
/// The engine drives one reaction at a time per resource; bodies never see
/// concurrent calls. All port access goes through the [`Reaction`] context,
/// which enforces the read/compute/write/propagate shape of a reaction.
pub trait FunctionBlock: Send + 'static {
    /// The compiled interface of this block type.
    fn interface(&self) -> InterfaceHandle;

    /// One reaction to one received event input.
    fn execute_event(&mut self, event: PortId, reaction: &mut Reaction<'_>);

    /// Hook invoked after an accepted lifecycle transition, letting bodies
    /// tie cleanup to Stop/Kill (a timeout block cancels its timer here).
    fn on_state_change(&mut self, cmd: StateCommand, ctx: &mut LifecycleCtx<'_>) {
        let _ = (cmd, ctx);
    }
}

/// Per-reaction execution context handed to [`FunctionBlock::execute_event`].
pub struct Reaction<'a> {
    pub(crate) spec: &'a PortSpec,
    pub(crate) inputs: &'a [Value],
    pub(crate) outputs: &'a mut [Value],
    pub(crate) fired: &'a mut Vec<Fired>,
    pub(crate) timer: &'a TimerService,
    pub(crate) executor: &'a ExecutorHandle,
    pub(crate) addr: BlockAddr,
}

impl Reaction<'_> {
    pub fn spec(&self) -> &PortSpec {
        self.spec
    }

    pub fn addr(&self) -> BlockAddr {
        self.addr
    }

    /// Current value of a data input.
    pub fn input_data(&self, port: DataInRef) -> Option<&Value> {
        self.inputs.get(port.index()?)
    }

    /// Writes a data output. A value whose type does not match the declared
    /// port type is dropped with a warning; the reaction continues.
    pub fn set_output_data(&mut self, port: DataOutRef, value: Value) {
        let Some(index) = port.index() else {
            tracing::warn!(block = %self.addr, "write to invalid data output ignored");
            return;
        };
        match self.spec.data_output_type(port.id()) {
            Some(ty) if ty == value.data_type() => {
                if let Some(slot) = self.outputs.get_mut(index) {
                    *slot = value;
                }
            }
            declared => {
                tracing::warn!(
                    block = %self.addr,
                    port = index,
                    ?declared,
                    "data output type mismatch; write ignored"
                );
            }
        }
    }

    /// Fires an output event. Its with-binding is committed and the event is
    /// routed to every connected input, in declared order, once the reaction
    /// returns.
    pub fn send_output_event(&mut self, event: EventOutRef) {
        match event.index() {
            Some(i) if i < self.spec.num_event_outputs() => {
                self.fired.push(Fired::Output(i as PortId));
            }
            _ => tracing::warn!(block = %self.addr, "invalid output event ignored"),
        }
    }

    /// Fires an event through an adapter (socket/plug composite port).
    pub fn send_adapter_event(&mut self, adapter: PortId, event: PortId) {
        if self.spec.adapter(adapter).is_none() {
            tracing::warn!(block = %self.addr, adapter, "invalid adapter event ignored");
            return;
        }
        self.fired.push(Fired::Adapter { adapter, event });
    }

    /// Schedules re-delivery of `event` to this block after `delay`,
    /// capturing the currently active executor. Zero delay fires as soon
    /// as possible. A pending registration for this block is replaced.
    pub fn register_timed_fb(&mut self, event: EventInRef, delay: Duration) {
        let Some(_) = event.index() else {
            tracing::warn!(block = %self.addr, "timer registration with invalid event ignored");
            return;
        };
        self.timer.register_timed_fb(
            TimerEntry {
                addr: self.addr,
                event: event.id(),
                executor: self.executor.clone(),
            },
            delay,
        );
    }

    /// Cancels any pending timer registration for this block. Idempotent and
    /// safe to call from within the block's own reaction.
    pub fn unregister_timed_fb(&mut self) {
        self.timer.unregister_timed_fb(self.addr);
    }
}

/// Context for [`FunctionBlock::on_state_change`].
pub struct LifecycleCtx<'a> {
    pub(crate) timer: &'a TimerService,
    pub(crate) addr: BlockAddr,
}

impl LifecycleCtx<'_> {
    pub fn addr(&self) -> BlockAddr {
        self.addr
    }

    /// Cancels any pending timer registration for this block.
    pub fn unregister_timed_fb(&mut self) {
        self.timer.unregister_timed_fb(self.addr);
    }
}
