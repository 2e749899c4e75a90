//! Resource: one scheduling domain, one thread. The thread drains lifecycle
//! commands from its control lane, runs queued event chains to completion
//! one at a time, and backs off when idle.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;

use crate::block::instance::BlockRuntime;
use crate::block::{ResourceId, StateResponse};
use crate::config::ResourceConfig;
use crate::control::{CommandInput, QueuedEvent};
use crate::error::{ConfigError, LifecycleError, SendError, TryRecvError};
use crate::exec::chain::{ChainEngine, Router};
use crate::exec::{ExecutorHandle, TimerService};
use crate::io::{
    BaseRx, BaseTx, MpmcChannel, MpmcReceiver, MpmcSender, RingBuffer, RingReceiver, RingSender,
};
use crate::network::Network;
use crate::utils::{try_pin_core, CancelToken, HealthFlag};

pub struct Resource {
    id: ResourceId,
    cfg: ResourceConfig,
    network: Option<Network>,
    cmd_tx: RingSender<CommandInput>,
    cmd_rx: Option<RingReceiver<CommandInput>>,
    event_tx: MpmcSender<QueuedEvent>,
    event_rx: Option<MpmcReceiver<QueuedEvent>>,
    join: Option<JoinHandle<()>>,
    running: HealthFlag,
}

impl Resource {
    pub(crate) fn new(id: ResourceId, cfg: ResourceConfig) -> Self {
        let (cmd_tx, cmd_rx) = RingBuffer::bounded::<CommandInput>(64);
        let (event_tx, event_rx) = MpmcChannel::bounded::<QueuedEvent>(cfg.max_inputs_pending);
        Self {
            id,
            cfg,
            network: Some(Network::new(id)),
            cmd_tx,
            cmd_rx: Some(cmd_rx),
            event_tx,
            event_rx: Some(event_rx),
            join: None,
            running: HealthFlag::new(false),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    /// True while the thread has applied Start and not yet Stop/Kill.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Handle onto this resource's run queue.
    pub(crate) fn executor(&self) -> ExecutorHandle {
        ExecutorHandle::new(self.event_tx.clone())
    }

    /// Mutable access to the block network; refused once the thread owns it.
    pub fn network_mut(&mut self) -> Result<&mut Network, ConfigError> {
        self.network.as_mut().ok_or(ConfigError::NetworkRunning)
    }

    pub fn network(&self) -> Result<&Network, ConfigError> {
        self.network.as_ref().ok_or(ConfigError::NetworkRunning)
    }

    pub(crate) fn send_command(
        &mut self,
        cmd: CommandInput,
    ) -> Result<(), SendError<CommandInput>> {
        self.cmd_tx.try_send(cmd)
    }

    /// Spawns the resource thread, moving the network onto it.
    pub(crate) fn start(
        &mut self,
        router: Router,
        timer: TimerService,
        cancel: CancelToken,
    ) -> Result<(), LifecycleError> {
        if self.join.is_some() {
            return Err(LifecycleError::AlreadyRunning);
        }
        let network = self.network.take().ok_or(LifecycleError::AlreadyRunning)?;
        let cmd_rx = self.cmd_rx.take().ok_or(LifecycleError::AlreadyRunning)?;
        let event_rx = self.event_rx.take().ok_or(LifecycleError::AlreadyRunning)?;

        let worker = Worker {
            id: self.id,
            cfg: self.cfg.clone(),
            blocks: network.into_blocks(),
            cmd_rx,
            event_rx,
            router,
            timer,
            executor: ExecutorHandle::new(self.event_tx.clone()),
            cancel,
            running: self.running.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("fbrt-{}", self.cfg.name))
            .spawn(move || worker.run())?;
        self.join = Some(handle);
        Ok(())
    }

    /// Waits for the thread to exit, bounded by `timeout`.
    pub(crate) fn join(&mut self, timeout: Duration) -> Result<(), LifecycleError> {
        let Some(handle) = self.join.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                self.join = Some(handle);
                return Err(LifecycleError::JoinTimeout(self.id.0));
            }
            thread::sleep(Duration::from_millis(1));
        }
        if handle.join().is_err() {
            tracing::error!(resource = self.id.0, "resource thread panicked");
        }
        Ok(())
    }
}

struct Worker {
    id: ResourceId,
    cfg: ResourceConfig,
    blocks: Vec<BlockRuntime>,
    cmd_rx: RingReceiver<CommandInput>,
    event_rx: MpmcReceiver<QueuedEvent>,
    router: Router,
    timer: TimerService,
    executor: ExecutorHandle,
    cancel: CancelToken,
    running: HealthFlag,
}

impl Worker {
    fn run(mut self) {
        if let Some(core) = self.cfg.core_id {
            match try_pin_core(core) {
                Ok(core) => tracing::debug!(resource = self.id.0, core, "pinned"),
                Err(err) => tracing::warn!(resource = self.id.0, %err, "core pinning failed"),
            }
        }
        tracing::info!(resource = self.id.0, name = %self.cfg.name, "resource thread started");

        let backoff = Backoff::new();
        let mut spins: u32 = 0;

        'outer: loop {
            if self.cancel.is_cancelled() {
                self.apply(CommandInput::Kill);
                break;
            }

            let mut worked = false;
            for cmd in self.cmd_rx.drain(self.cfg.max_inputs_drain) {
                worked = true;
                tracing::debug!(resource = self.id.0, ?cmd, "command");
                let exit = self.apply(cmd);
                if exit {
                    break 'outer;
                }
            }

            match self.event_rx.try_recv() {
                Ok(event) => {
                    worked = true;
                    let mut engine = ChainEngine {
                        blocks: &mut self.blocks,
                        router: &mut self.router,
                        timer: &self.timer,
                        executor: &self.executor,
                        max_depth: self.cfg.max_chain_depth,
                        resource: self.id,
                    };
                    if let Err(err) = engine.run(event) {
                        tracing::error!(resource = self.id.0, %err, "event chain aborted");
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.apply(CommandInput::Kill);
                    break;
                }
            }

            if worked {
                spins = 0;
                backoff.reset();
            } else {
                spins = spins.saturating_add(1);
                if spins < 64 {
                    backoff.spin();
                } else if spins < 256 {
                    backoff.snooze();
                } else {
                    thread::sleep(Duration::from_micros(2));
                }
            }
        }

        self.running.down();
        tracing::info!(resource = self.id.0, "resource thread stopped");
    }

    /// Applies one control command to every block. Returns true when the
    /// thread should exit.
    fn apply(&mut self, cmd: CommandInput) -> bool {
        if matches!(
            cmd,
            CommandInput::Stop | CommandInput::Kill | CommandInput::Shutdown
        ) {
            // Pending deliveries die with the running phase.
            let discarded = self.event_rx.drain(usize::MAX).len();
            if discarded > 0 {
                tracing::debug!(resource = self.id.0, discarded, "pending events dropped");
            }
        }
        if let Some(block_cmd) = cmd.block_command() {
            for block in &mut self.blocks {
                let resp = block.change_state(block_cmd, &self.timer);
                if resp != StateResponse::Ready {
                    tracing::debug!(block = %block.addr(), ?block_cmd, ?resp, "transition refused");
                }
            }
        }
        match cmd {
            CommandInput::Start => {
                self.running.up();
                false
            }
            CommandInput::Stop | CommandInput::Reset => {
                if cmd == CommandInput::Stop {
                    self.running.down();
                }
                false
            }
            CommandInput::Kill => {
                self.timer.unregister_resource(self.id);
                self.running.down();
                true
            }
            CommandInput::Shutdown => {
                self.running.down();
                true
            }
        }
    }
}
