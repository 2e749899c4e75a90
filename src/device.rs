//! Device: the process-level container. Owns the resources, the shared
//! timer thread and the root cancellation token, and enforces the
//! one-live-device-per-process rule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread::JoinHandle;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::block::instance::{DataDest, EventDest};
use crate::block::{BlockAddr, ResourceId};
use crate::config::{DeviceConfig, ResourceConfig};
use crate::control::{CommandInput, QueuedEvent};
use crate::error::{ConfigError, LifecycleError};
use crate::exec::chain::Router;
use crate::exec::{ExecutorHandle, TimerService};
use crate::network::Network;
use crate::resource::Resource;
use crate::spec::{InterfaceHandle, PortId};
use crate::utils::CancelToken;

/// Tracks whether a device is live in this process. One device may run at
/// a time; a second `start_device` is refused until the first shuts down.
pub struct DeviceRegistry {
    live: AtomicBool,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(false),
        }
    }

    fn claim(&self) -> bool {
        self.live
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static PROCESS_REGISTRY: LazyLock<Arc<DeviceRegistry>> =
    LazyLock::new(|| Arc::new(DeviceRegistry::new()));

pub struct Device {
    cfg: DeviceConfig,
    registry: Arc<DeviceRegistry>,
    resources: Vec<Resource>,
    /// Interface snapshot taken at start, for name resolution after the
    /// networks have moved onto their threads.
    specs: Vec<Vec<InterfaceHandle>>,
    executors: Vec<ExecutorHandle>,
    timer: TimerService,
    timer_join: Option<JoinHandle<()>>,
    cancel: CancelToken,
    started: bool,
}

impl Device {
    /// Device bound to the process-wide registry.
    pub fn new(cfg: DeviceConfig) -> Self {
        Self::with_registry(cfg, Arc::clone(&PROCESS_REGISTRY))
    }

    /// Device bound to an explicit registry. Lets tests run devices in
    /// parallel without fighting over the process-wide slot.
    pub fn with_registry(cfg: DeviceConfig, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            cfg,
            registry,
            resources: Vec::new(),
            specs: Vec::new(),
            executors: Vec::new(),
            timer: TimerService::new(),
            timer_join: None,
            cancel: CancelToken::new_root(),
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn num_resources(&self) -> usize {
        self.resources.len()
    }

    /// Adds a resource; refused once the device is started.
    pub fn add_resource(&mut self, cfg: ResourceConfig) -> Result<ResourceId, ConfigError> {
        if self.started {
            return Err(ConfigError::NetworkRunning);
        }
        let id = ResourceId(self.resources.len());
        tracing::debug!(resource = id.0, name = %cfg.name, "resource added");
        self.resources.push(Resource::new(id, cfg));
        Ok(id)
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource, ConfigError> {
        self.resources
            .get(id.0)
            .ok_or(ConfigError::UnknownResource(id.0))
    }

    fn resource_mut(&mut self, id: ResourceId) -> Result<&mut Resource, ConfigError> {
        self.resources
            .get_mut(id.0)
            .ok_or(ConfigError::UnknownResource(id.0))
    }

    /// Block network of one resource, for adding instances.
    pub fn network_mut(&mut self, id: ResourceId) -> Result<&mut Network, ConfigError> {
        self.resource_mut(id)?.network_mut()
    }

    /// Wires an event output to an event input, possibly across resources.
    pub fn connect_event(
        &mut self,
        src: BlockAddr,
        output: &str,
        dst: BlockAddr,
        input: &str,
    ) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::NetworkRunning);
        }
        let out_id = {
            let spec = self.resource(src.resource)?.network()?.block_spec(src.block)?;
            spec.find_event_output(output)
                .id_checked()
                .ok_or_else(|| ConfigError::UnknownPort(output.to_string()))?
        };
        let in_id = {
            let spec = self.resource(dst.resource)?.network()?.block_spec(dst.block)?;
            spec.find_event_input(input)
                .id_checked()
                .ok_or_else(|| ConfigError::UnknownPort(input.to_string()))?
        };
        let dest = EventDest {
            resource: dst.resource,
            block: dst.block,
            input: in_id,
        };
        self.resource_mut(src.resource)?
            .network_mut()?
            .push_event_conn(src.block, out_id, dest)
    }

    /// Wires a data output to a data input. Both ends must live on the same
    /// resource and the declared types must match.
    pub fn connect_data(
        &mut self,
        src: BlockAddr,
        output: &str,
        dst: BlockAddr,
        input: &str,
    ) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::NetworkRunning);
        }
        if src.resource != dst.resource {
            return Err(ConfigError::CrossResourceData);
        }
        let (out_id, out_ty) = {
            let spec = self.resource(src.resource)?.network()?.block_spec(src.block)?;
            let id = spec
                .find_data_output(output)
                .id_checked()
                .ok_or_else(|| ConfigError::UnknownPort(output.to_string()))?;
            (id, spec.data_output_type(id))
        };
        let (in_id, in_ty) = {
            let spec = self.resource(dst.resource)?.network()?.block_spec(dst.block)?;
            let id = spec
                .find_data_input(input)
                .id_checked()
                .ok_or_else(|| ConfigError::UnknownPort(input.to_string()))?;
            (id, spec.data_input_type(id))
        };
        if out_ty != in_ty {
            return Err(ConfigError::TypeMismatch {
                port: input.to_string(),
            });
        }
        let dest = DataDest {
            block: dst.block,
            input: in_id,
        };
        self.resource_mut(src.resource)?
            .network_mut()?
            .push_data_conn(src.block, out_id, dest)
    }

    /// Routes events fired through `src`'s adapter (by adapter-local event
    /// index) to an event input of `dst`.
    pub fn connect_adapter(
        &mut self,
        src: BlockAddr,
        adapter: &str,
        event: PortId,
        dst: BlockAddr,
        input: &str,
    ) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::NetworkRunning);
        }
        let adapter_id = {
            let spec = self.resource(src.resource)?.network()?.block_spec(src.block)?;
            spec.find_adapter(adapter)
                .ok_or_else(|| ConfigError::UnknownPort(adapter.to_string()))?
        };
        let in_id = {
            let spec = self.resource(dst.resource)?.network()?.block_spec(dst.block)?;
            spec.find_event_input(input)
                .id_checked()
                .ok_or_else(|| ConfigError::UnknownPort(input.to_string()))?
        };
        let dest = EventDest {
            resource: dst.resource,
            block: dst.block,
            input: in_id,
        };
        self.resource_mut(src.resource)?
            .network_mut()?
            .push_adapter_conn(src.block, adapter_id, event, dest)
    }

    /// Starts the device: claims the process slot, spawns the timer thread
    /// and every resource thread, and transitions all blocks to Running.
    pub fn start_device(&mut self) -> Result<(), LifecycleError> {
        if self.started || !self.registry.claim() {
            return Err(LifecycleError::AlreadyRunning);
        }
        if let Err(err) = self.spawn_all() {
            self.registry.release();
            return Err(err);
        }
        self.started = true;
        tracing::info!(resources = self.resources.len(), "device started");
        Ok(())
    }

    fn spawn_all(&mut self) -> Result<(), LifecycleError> {
        self.specs.clear();
        for resource in &self.resources {
            let network = resource.network().map_err(|_| LifecycleError::AlreadyRunning)?;
            self.specs.push(network.block_handles());
        }
        self.executors = self.resources.iter().map(Resource::executor).collect();

        self.timer_join = Some(self.timer.spawn()?);

        for i in 0..self.resources.len() {
            let cancel = self.cancel.new_child();
            let mut router = Router::new(cancel.clone());
            for (j, exec) in self.executors.iter().enumerate() {
                if i != j {
                    router.insert(ResourceId(j), exec.clone());
                }
            }
            let resource = &mut self.resources[i];
            resource.start(router, self.timer.clone(), cancel)?;
            if let Err(err) = resource.send_command(CommandInput::Start) {
                tracing::error!(resource = i, %err, "start command not delivered");
            }
        }
        Ok(())
    }

    /// Injects an event into a Running block by event-input name.
    pub fn fire_event(&mut self, addr: BlockAddr, event: &str) -> anyhow::Result<()> {
        if !self.started {
            return Err(LifecycleError::NotStarted.into());
        }
        let spec = self
            .specs
            .get(addr.resource.0)
            .ok_or(ConfigError::UnknownResource(addr.resource.0))?
            .get(addr.block.0)
            .ok_or(ConfigError::UnknownBlock(addr.block.0))?;
        let input = spec
            .find_event_input(event)
            .id_checked()
            .ok_or_else(|| ConfigError::UnknownPort(event.to_string()))?;
        let executor = self
            .executors
            .get_mut(addr.resource.0)
            .ok_or(ConfigError::UnknownResource(addr.resource.0))?;
        executor.deliver(QueuedEvent {
            block: addr.block,
            input,
        })?;
        Ok(())
    }

    /// Broadcasts a lifecycle command to every resource.
    pub fn change_fb_execution_state(&mut self, cmd: CommandInput) -> anyhow::Result<()> {
        if !self.started {
            return Err(LifecycleError::NotStarted.into());
        }
        for resource in &mut self.resources {
            resource.send_command(cmd)?;
        }
        Ok(())
    }

    /// Stops and joins every resource thread and the timer thread, then
    /// releases the process slot. Safe to call more than once.
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        if !self.started {
            return Ok(());
        }
        for resource in &mut self.resources {
            if let Err(err) = resource.send_command(CommandInput::Shutdown) {
                tracing::warn!(resource = resource.id().0, %err, "shutdown command not delivered");
            }
        }

        let timeout = Duration::from_millis(self.cfg.join_timeout_ms);
        let mut first_err: Option<LifecycleError> = None;
        for resource in &mut self.resources {
            if resource.join(timeout).is_err() {
                // Stuck thread: escalate through the cancel token and retry.
                self.cancel.cancel();
                if let Err(err) = resource.join(timeout) {
                    tracing::error!(resource = resource.id().0, %err, "resource did not join");
                    first_err.get_or_insert(err);
                }
            }
        }

        self.timer.shutdown();
        if let Some(join) = self.timer_join.take()
            && join.join().is_err()
        {
            tracing::error!("timer thread panicked");
        }

        self.registry.release();
        self.started = false;
        tracing::info!("device stopped");
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Runs until SIGINT or SIGTERM, then shuts down.
    pub fn run_blocking(&mut self) -> anyhow::Result<()> {
        if !self.started {
            self.start_device()?;
        }
        let stop = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, Arc::clone(&stop))?;
        signal_hook::flag::register(SIGINT, Arc::clone(&stop))?;
        while !stop.load(Ordering::Relaxed) && !self.cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(50));
        }
        tracing::info!("stop signal received");
        self.shutdown()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.started
            && let Err(err) = self.shutdown()
        {
            tracing::error!(%err, "shutdown on drop failed");
        }
    }
}
