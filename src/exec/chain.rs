use std::collections::VecDeque;
use std::time::Duration;

use ahash::AHashMap;

use crate::block::behavior::Fired;
use crate::block::instance::{BlockRuntime, DataDest, EventDest};
use crate::block::ResourceId;
use crate::control::QueuedEvent;
use crate::error::ChainOverflow;
use crate::exec::timer::TimerService;
use crate::exec::ExecutorHandle;
use crate::spec::Value;
use crate::utils::CancelToken;

/// How long a handover waits on a congested peer queue before the event
/// is dropped.
const HANDOVER_TIMEOUT: Duration = Duration::from_millis(10);

/// Handles onto the run queues of peer resources, for event connections
/// that cross a resource boundary.
pub(crate) struct Router {
    peers: AHashMap<ResourceId, ExecutorHandle>,
    cancel: CancelToken,
}

impl Router {
    pub(crate) fn new(cancel: CancelToken) -> Self {
        Self {
            peers: AHashMap::new(),
            cancel,
        }
    }

    pub(crate) fn insert(&mut self, resource: ResourceId, handle: ExecutorHandle) {
        self.peers.insert(resource, handle);
    }

    /// Hands an event over to another resource's run queue, waiting out a
    /// brief burst of backpressure. A peer that stays congested past
    /// [`HANDOVER_TIMEOUT`], or has shut down, drops the event with a
    /// warning; the local chain keeps running.
    fn deliver(&mut self, resource: ResourceId, event: QueuedEvent) {
        match self.peers.get_mut(&resource) {
            Some(handle) => {
                if let Err(err) = handle.send(event, &self.cancel, HANDOVER_TIMEOUT) {
                    tracing::warn!(resource = resource.0, %err, "cross-resource event dropped");
                }
            }
            None => {
                tracing::warn!(resource = resource.0, "event for unknown resource dropped");
            }
        }
    }
}

/// Runs one event chain to completion on the owning resource thread.
///
/// Deliveries are processed strictly FIFO. For each event a block fires,
/// the with-bound data is committed to the connected inputs before the
/// event itself is routed, and connected inputs receive the event in
/// wiring order.
pub(crate) struct ChainEngine<'a> {
    pub blocks: &'a mut Vec<BlockRuntime>,
    pub router: &'a mut Router,
    pub timer: &'a TimerService,
    pub executor: &'a ExecutorHandle,
    /// Ceiling on local deliveries queued by one chain, the origin excluded.
    pub max_depth: usize,
    pub resource: ResourceId,
}

impl ChainEngine<'_> {
    pub(crate) fn run(&mut self, origin: QueuedEvent) -> Result<(), ChainOverflow> {
        let mut queue = VecDeque::new();
        queue.push_back(origin);
        let mut budget = self.max_depth;
        let mut fired: Vec<Fired> = Vec::new();
        let mut writes: Vec<(DataDest, Value)> = Vec::new();
        let mut dests: Vec<EventDest> = Vec::new();

        while let Some(delivery) = queue.pop_front() {
            let Some(block) = self.blocks.get_mut(delivery.block.0) else {
                tracing::warn!(
                    resource = self.resource.0,
                    block = delivery.block.0,
                    "event for unknown block dropped"
                );
                continue;
            };
            fired.clear();
            if !block.receive_input_event(delivery.input, &mut fired, self.timer, self.executor) {
                continue;
            }

            for output in fired.drain(..) {
                writes.clear();
                dests.clear();
                self.collect(delivery.block.0, output, &mut writes, &mut dests);

                for (dest, value) in writes.drain(..) {
                    let Some(target) = self.blocks.get_mut(dest.block.0) else {
                        continue;
                    };
                    if let Some(slot) = target.inputs.get_mut(dest.input as usize) {
                        *slot = value;
                    }
                }
                for dest in dests.drain(..) {
                    let event = QueuedEvent {
                        block: dest.block,
                        input: dest.input,
                    };
                    if dest.resource == self.resource {
                        if budget == 0 {
                            return Err(ChainOverflow {
                                max: self.max_depth,
                            });
                        }
                        budget -= 1;
                        queue.push_back(event);
                    } else {
                        self.router.deliver(dest.resource, event);
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads the source block's connection tables for one fired event:
    /// with-bound output values to commit, then the event destinations.
    fn collect(
        &self,
        source: usize,
        output: Fired,
        writes: &mut Vec<(DataDest, Value)>,
        dests: &mut Vec<EventDest>,
    ) {
        let src = &self.blocks[source];
        match output {
            Fired::Output(out) => {
                if let Some(with) = src.spec().output_with(out) {
                    for port in with.ids() {
                        let Some(value) = src.outputs.get(port as usize) else {
                            continue;
                        };
                        for dest in &src.data_conns[port as usize] {
                            writes.push((*dest, value.clone()));
                        }
                    }
                }
                dests.extend(src.event_conns[out as usize].iter().copied());
            }
            Fired::Adapter { adapter, event } => {
                match src.adapter_conns.get(&(adapter, event)) {
                    Some(routed) => dests.extend(routed.iter().copied()),
                    None => {
                        tracing::debug!(
                            block = %src.addr(),
                            adapter,
                            event,
                            "unconnected adapter event dropped"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::block::{
        BlockAddr, BlockId, FunctionBlock, Reaction, StateCommand,
    };
    use crate::io::MpmcChannel;
    use crate::spec::{DataType, InterfaceHandle, PortId, SpecBuilder};

    fn relay_spec() -> InterfaceHandle {
        let mut b = SpecBuilder::new();
        let ei = b.events_in.add("EI");
        let eo = b.events_out.add("EO");
        let di = b.data_in.add("IN", DataType::Int);
        let out = b.data_out.add("OUT", DataType::Int);
        b.bind(ei, di);
        b.bind(eo, out);
        InterfaceHandle::dynamic(b.build().unwrap())
    }

    /// Copies IN to OUT and fires EO on every EI.
    struct Relay {
        spec: InterfaceHandle,
        log: Arc<Mutex<Vec<i64>>>,
    }

    impl Relay {
        fn new(log: Arc<Mutex<Vec<i64>>>) -> Self {
            Self {
                spec: relay_spec(),
                log,
            }
        }
    }

    impl FunctionBlock for Relay {
        fn interface(&self) -> InterfaceHandle {
            self.spec.clone()
        }

        fn execute_event(&mut self, _event: PortId, reaction: &mut Reaction<'_>) {
            let di = reaction.spec().find_data_input("IN");
            let out = reaction.spec().find_data_output("OUT");
            let eo = reaction.spec().find_event_output("EO");
            let seen = reaction
                .input_data(di)
                .and_then(Value::as_int)
                .unwrap_or(0);
            self.log.lock().push(seen);
            reaction.set_output_data(out, Value::Int(seen + 1));
            reaction.send_output_event(eo);
        }
    }

    fn make_block(resource: usize, index: usize, log: &Arc<Mutex<Vec<i64>>>) -> BlockRuntime {
        BlockRuntime::new(
            Box::new(Relay::new(Arc::clone(log))),
            BlockAddr {
                resource: ResourceId(resource),
                block: BlockId(index),
            },
        )
    }

    fn engine_parts() -> (TimerService, ExecutorHandle, Router) {
        let timer = TimerService::new();
        let (tx, _rx) = MpmcChannel::bounded::<QueuedEvent>(64);
        let router = Router::new(CancelToken::new_root());
        (timer, ExecutorHandle::new(tx), router)
    }

    #[test]
    fn chain_commits_with_bound_data_before_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (timer, exec, mut router) = engine_parts();

        let mut blocks = vec![make_block(0, 0, &log), make_block(0, 1, &log)];
        blocks[0].event_conns[0].push(EventDest {
            resource: ResourceId(0),
            block: BlockId(1),
            input: 0,
        });
        blocks[0].data_conns[0].push(DataDest {
            block: BlockId(1),
            input: 0,
        });
        for b in &mut blocks {
            b.change_state(StateCommand::Start, &timer);
        }
        blocks[0].inputs[0] = Value::Int(41);

        let mut engine = ChainEngine {
            blocks: &mut blocks,
            router: &mut router,
            timer: &timer,
            executor: &exec,
            max_depth: 16,
            resource: ResourceId(0),
        };
        engine
            .run(QueuedEvent {
                block: BlockId(0),
                input: 0,
            })
            .unwrap();

        // Block 1 must observe block 0's committed output, not its default.
        assert_eq!(*log.lock(), vec![41, 42]);
    }

    #[test]
    fn runaway_chain_is_bounded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (timer, exec, mut router) = engine_parts();

        // EO wired back to the block's own EI.
        let mut blocks = vec![make_block(0, 0, &log)];
        blocks[0].event_conns[0].push(EventDest {
            resource: ResourceId(0),
            block: BlockId(0),
            input: 0,
        });
        blocks[0].change_state(StateCommand::Start, &timer);

        let mut engine = ChainEngine {
            blocks: &mut blocks,
            router: &mut router,
            timer: &timer,
            executor: &exec,
            max_depth: 8,
            resource: ResourceId(0),
        };
        let err = engine
            .run(QueuedEvent {
                block: BlockId(0),
                input: 0,
            })
            .unwrap_err();
        assert_eq!(err.max, 8);
        // Origin plus the eight queued deliveries ran before the abort.
        assert_eq!(log.lock().len(), 9);
    }

    #[test]
    fn stopped_block_terminates_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (timer, exec, mut router) = engine_parts();

        let mut blocks = vec![make_block(0, 0, &log), make_block(0, 1, &log)];
        blocks[0].event_conns[0].push(EventDest {
            resource: ResourceId(0),
            block: BlockId(1),
            input: 0,
        });
        // Only the origin block runs.
        blocks[0].change_state(StateCommand::Start, &timer);

        let mut engine = ChainEngine {
            blocks: &mut blocks,
            router: &mut router,
            timer: &timer,
            executor: &exec,
            max_depth: 16,
            resource: ResourceId(0),
        };
        engine
            .run(QueuedEvent {
                block: BlockId(0),
                input: 0,
            })
            .unwrap();
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn congested_peer_drops_the_handover_after_the_grace_period() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (timer, exec, _) = engine_parts();
        let mut router = Router::new(CancelToken::new_root());
        let (peer_tx, mut peer_rx) = MpmcChannel::bounded::<QueuedEvent>(1);
        let mut stuffed = ExecutorHandle::new(peer_tx.clone());
        stuffed
            .deliver(QueuedEvent {
                block: BlockId(9),
                input: 0,
            })
            .unwrap();
        router.insert(ResourceId(1), ExecutorHandle::new(peer_tx));

        let mut blocks = vec![make_block(0, 0, &log)];
        blocks[0].event_conns[0].push(EventDest {
            resource: ResourceId(1),
            block: BlockId(7),
            input: 3,
        });
        blocks[0].change_state(StateCommand::Start, &timer);

        let mut engine = ChainEngine {
            blocks: &mut blocks,
            router: &mut router,
            timer: &timer,
            executor: &exec,
            max_depth: 16,
            resource: ResourceId(0),
        };
        // The peer queue stays full; the chain completes without the event.
        engine
            .run(QueuedEvent {
                block: BlockId(0),
                input: 0,
            })
            .unwrap();

        use crate::io::base::BaseRx;
        let only = peer_rx.try_recv().unwrap();
        assert_eq!(only.block, BlockId(9));
        assert!(peer_rx.try_recv().is_err());
    }

    #[test]
    fn cross_resource_destination_goes_through_the_router() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (timer, exec, mut router) = engine_parts();
        let (peer_tx, mut peer_rx) = MpmcChannel::bounded::<QueuedEvent>(8);
        router.insert(ResourceId(1), ExecutorHandle::new(peer_tx));

        let mut blocks = vec![make_block(0, 0, &log)];
        blocks[0].event_conns[0].push(EventDest {
            resource: ResourceId(1),
            block: BlockId(7),
            input: 3,
        });
        blocks[0].change_state(StateCommand::Start, &timer);

        let mut engine = ChainEngine {
            blocks: &mut blocks,
            router: &mut router,
            timer: &timer,
            executor: &exec,
            max_depth: 16,
            resource: ResourceId(0),
        };
        engine
            .run(QueuedEvent {
                block: BlockId(0),
                input: 0,
            })
            .unwrap();

        use crate::io::base::BaseRx;
        let handed_over = peer_rx.try_recv().unwrap();
        assert_eq!(handed_over.block, BlockId(7));
        assert_eq!(handed_over.input, 3);
    }
}
