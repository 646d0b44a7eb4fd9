use std::cell::RefCell;
use std::rc::Rc;

use minvr_events::VrEvent;
use minvr_fsm::{ConditionSet, ConfigError, Fsm, FsmDefinition, TokenRegistry};
use minvr_router::{EventManager, QueuePosition, RouterError, TickReport, DEFAULT_LISTENER_PRIORITY};

use crate::cluster::{ClusterError, ClusterNode, StandaloneNode};
use crate::config::EngineConfig;

/// Errors from driving frames.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Fsm(#[from] ConfigError),
    #[error("engine has been shut down")]
    ShutDown,
}

/// Application context: the router, the shared token registry and the
/// cluster node, driven one frame at a time.
///
/// A frame has two phases. [`collect_and_dispatch`](Self::collect_and_dispatch)
/// gathers input and delivers it; the caller then draws and calls
/// [`wait_for_peers_and_present`](Self::wait_for_peers_and_present).
pub struct VrEngine {
    config: EngineConfig,
    events: EventManager,
    tokens: TokenRegistry,
    cluster: Box<dyn ClusterNode>,
    initialized: bool,
    shut_down: bool,
    frame: u64,
}

impl VrEngine {
    /// An engine running on a single node.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_cluster(config, Box::new(StandaloneNode))
    }

    pub fn with_cluster(config: EngineConfig, cluster: Box<dyn ClusterNode>) -> Self {
        let events = EventManager::with_config(config.router.clone());
        Self {
            config,
            events,
            tokens: TokenRegistry::new(),
            cluster,
            initialized: false,
            shut_down: false,
            frame: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_manager(&self) -> &EventManager {
        &self.events
    }

    pub fn event_manager_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    /// Completed frames.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Register an FSM with the router at the default priority.
    ///
    /// The FSM should share this engine's token registry.
    pub fn add_fsm(&mut self, fsm: Fsm) -> Rc<RefCell<Fsm>> {
        let fsm = Rc::new(RefCell::new(fsm));
        self.events
            .register_listener(fsm.clone(), DEFAULT_LISTENER_PRIORITY);
        fsm
    }

    /// Build an FSM from a definition with this engine's tokens and register it.
    pub fn load_fsm(
        &mut self,
        definition: &FsmDefinition,
        conditions: &ConditionSet,
    ) -> Result<Rc<RefCell<Fsm>>, EngineError> {
        let fsm = Fsm::from_definition(definition, self.tokens.clone(), conditions)?;
        Ok(self.add_fsm(fsm))
    }

    /// Start the cluster node. Called on the first frame if not done before.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }
        if !self.initialized {
            self.cluster.initialize()?;
            self.initialized = true;
            tracing::info!(
                delta_time = self.config.emit_delta_time,
                "engine initialized"
            );
        }
        Ok(())
    }

    /// First half of a frame: poll input, agree on the queue with the rest of
    /// the cluster, then dispatch it.
    ///
    /// Events that cannot be replicated (object references) skip cluster
    /// synchronization and are appended after the synchronized events. If
    /// synchronization fails the frame's queue is left in the router as it
    /// was, polled events included.
    pub fn collect_and_dispatch(&mut self, dt: f32) -> Result<TickReport, EngineError> {
        self.initialize()?;
        let _span = tracing::debug_span!("frame", frame = self.frame).entered();

        let polled = self.events.poll_input_devices();
        let taken = self.events.take_event_queue();
        let mut queue: Vec<VrEvent> = taken
            .iter()
            .filter(|e| e.is_cluster_safe())
            .cloned()
            .collect();
        if queue.len() < taken.len() {
            tracing::trace!(
                count = taken.len() - queue.len(),
                "withholding node-local events from sync"
            );
        }

        if let Err(err) = self.cluster.synchronize_input_events(&mut queue) {
            tracing::warn!(error = %err, queued = taken.len(), "input sync failed; queue kept");
            self.events.set_event_queue(taken);
            return Err(err.into());
        }
        queue.extend(taken.into_iter().filter(|e| !e.is_cluster_safe()));
        self.events.set_event_queue(queue);

        if self.config.emit_delta_time {
            self.events.queue_event(
                QueuePosition::Front,
                VrEvent::float(&self.config.delta_time_event_name, dt),
            )?;
        }

        let report = self.events.dispatch_tick();
        tracing::debug!(
            polled,
            dispatched = report.events_dispatched,
            faults = report.listener_faults,
            "frame dispatched"
        );
        Ok(report)
    }

    /// Second half of a frame: wait until every node is ready to swap buffers.
    pub fn wait_for_peers_and_present(&mut self) -> Result<(), EngineError> {
        self.initialize()?;
        self.cluster.synchronize_frame_boundary()?;
        self.frame += 1;
        Ok(())
    }

    /// Run both halves of a frame with nothing drawn in between.
    pub fn tick(&mut self, dt: f32) -> Result<TickReport, EngineError> {
        let report = self.collect_and_dispatch(dt)?;
        self.wait_for_peers_and_present()?;
        Ok(report)
    }

    /// Shut the cluster node down. Later frames fail with [`EngineError::ShutDown`].
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        if self.initialized {
            self.cluster.shutdown()?;
        }
        tracing::info!(frames = self.frame, "engine shut down");
        Ok(())
    }
}

impl Drop for VrEngine {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(%err, "cluster shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minvr_events::{EventPrototype, ObjectRef};
    use minvr_fsm::ArcSpec;
    use minvr_input::ScriptedDevice;
    use minvr_router::{shared, DispatchContext, EventListener, ListenerResult};

    #[derive(Default)]
    struct Recorder(Vec<VrEvent>);

    impl EventListener for Recorder {
        fn on_event(&mut self, event: &VrEvent, _ctx: &mut DispatchContext) -> ListenerResult {
            self.0.push(event.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Calls {
        initialized: u32,
        synced: Vec<Vec<VrEvent>>,
        boundaries: u32,
        shutdowns: u32,
    }

    /// Pretends a peer node contributed one event per frame.
    struct FakeCluster {
        calls: Rc<RefCell<Calls>>,
        fail_sync: bool,
    }

    impl ClusterNode for FakeCluster {
        fn initialize(&mut self) -> Result<(), ClusterError> {
            self.calls.borrow_mut().initialized += 1;
            Ok(())
        }

        fn synchronize_input_events(&mut self, events: &mut Vec<VrEvent>) -> Result<(), ClusterError> {
            if self.fail_sync {
                return Err(ClusterError::Connection("peer unreachable".into()));
            }
            self.calls.borrow_mut().synced.push(events.clone());
            events.push(VrEvent::named("Peer"));
            Ok(())
        }

        fn synchronize_frame_boundary(&mut self) -> Result<(), ClusterError> {
            self.calls.borrow_mut().boundaries += 1;
            Ok(())
        }

        fn shutdown(&mut self) -> Result<(), ClusterError> {
            self.calls.borrow_mut().shutdowns += 1;
            Ok(())
        }
    }

    fn names(events: &[VrEvent]) -> Vec<&str> {
        events.iter().map(VrEvent::name).collect()
    }

    #[test]
    fn delta_time_leads_the_queue() {
        let mut engine = VrEngine::new(EngineConfig::default());
        let rec = shared(Recorder::default());
        engine
            .event_manager_mut()
            .register_listener(rec.clone(), DEFAULT_LISTENER_PRIORITY);
        engine
            .event_manager_mut()
            .queue_event(QueuePosition::Back, VrEvent::named("App"))
            .unwrap();

        let report = engine.tick(0.016).unwrap();
        assert_eq!(report.events_dispatched, 2);
        let rec = rec.borrow();
        assert_eq!(names(&rec.0), ["FrameStart", "App"]);
        assert_eq!(rec.0[0].data().as_float(), Some(0.016));
        assert_eq!(engine.frame(), 1);
    }

    #[test]
    fn delta_time_can_be_disabled() {
        let config = EngineConfig {
            emit_delta_time: false,
            ..EngineConfig::default()
        };
        let mut engine = VrEngine::new(config);
        let report = engine.tick(0.016).unwrap();
        assert_eq!(report.events_dispatched, 0);
    }

    #[test]
    fn local_events_skip_cluster_sync() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let cluster = FakeCluster {
            calls: calls.clone(),
            fail_sync: false,
        };
        let config = EngineConfig {
            emit_delta_time: false,
            ..EngineConfig::default()
        };
        let mut engine = VrEngine::with_cluster(config, Box::new(cluster));
        let device = shared(ScriptedDevice::new([vec![
            VrEvent::object("Picked", ObjectRef::new()),
            VrEvent::named("Button"),
        ]]));
        engine.event_manager_mut().add_polled_input_device(device);
        let rec = shared(Recorder::default());
        engine
            .event_manager_mut()
            .register_listener(rec.clone(), DEFAULT_LISTENER_PRIORITY);

        engine.tick(0.0).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.initialized, 1);
        assert_eq!(calls.boundaries, 1);
        assert_eq!(names(&calls.synced[0]), ["Button"]);
        assert_eq!(names(&rec.borrow().0), ["Button", "Peer", "Picked"]);
    }

    #[test]
    fn cluster_failure_is_reported() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let cluster = FakeCluster {
            calls,
            fail_sync: true,
        };
        let mut engine = VrEngine::with_cluster(EngineConfig::default(), Box::new(cluster));
        let err = engine.collect_and_dispatch(0.0).unwrap_err();
        assert!(matches!(err, EngineError::Cluster(ClusterError::Connection(_))));
        assert_eq!(engine.frame(), 0);
    }

    #[test]
    fn failed_sync_keeps_queue() {
        let cluster = FakeCluster {
            calls: Rc::new(RefCell::new(Calls::default())),
            fail_sync: true,
        };
        let mut engine = VrEngine::with_cluster(EngineConfig::default(), Box::new(cluster));
        let device = shared(ScriptedDevice::new([vec![VrEvent::named("Polled")]]));
        engine.event_manager_mut().add_polled_input_device(device);
        let picked = VrEvent::object("Picked", ObjectRef::new());
        engine
            .event_manager_mut()
            .queue_event(QueuePosition::Back, VrEvent::named("Keep"))
            .unwrap();
        engine
            .event_manager_mut()
            .queue_event(QueuePosition::Back, picked.clone())
            .unwrap();

        assert!(engine.collect_and_dispatch(0.0).is_err());
        assert_eq!(
            engine.event_manager().event_queue(),
            [VrEvent::named("Keep"), picked, VrEvent::named("Polled")]
        );
    }

    #[test]
    fn shutdown_once_and_refuse_frames() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let cluster = FakeCluster {
            calls: calls.clone(),
            fail_sync: false,
        };
        let mut engine = VrEngine::with_cluster(EngineConfig::default(), Box::new(cluster));
        engine.tick(0.0).unwrap();
        engine.shutdown().unwrap();
        assert!(matches!(engine.tick(0.0), Err(EngineError::ShutDown)));
        drop(engine);
        assert_eq!(calls.borrow().shutdowns, 1);
    }

    #[test]
    fn scripted_go_moves_fsm_to_active() {
        let mut engine = VrEngine::new(EngineConfig::default());
        let mut fsm = Fsm::new("demo", "Idle", engine.tokens().clone());
        let idle = fsm.start_state();
        let active = fsm.add_state("Active").unwrap();
        fsm.add_arc(ArcSpec::on_event(idle, active, EventPrototype::named("Go")))
            .unwrap();
        let fsm = engine.add_fsm(fsm);
        let device = shared(ScriptedDevice::new([vec![], vec![VrEvent::named("Go")]]));
        engine.event_manager_mut().add_polled_input_device(device);

        engine.tick(0.016).unwrap();
        assert_eq!(fsm.borrow().current_state_name(), "Idle");
        engine.tick(0.016).unwrap();
        assert_eq!(fsm.borrow().current_state_name(), "Active");
    }

    #[test]
    fn loaded_fsm_shares_engine_tokens() {
        let yaml = "name: grab\nstart: Idle\nstates: [Idle, Held]\narcs:\n  - { from: Idle, to: Held, event: { name: Grab }, require_token: hand }\n";
        let def = FsmDefinition::from_yaml_str(yaml).unwrap();
        let mut engine = VrEngine::new(EngineConfig::default());
        let fsm = engine.load_fsm(&def, &ConditionSet::new()).unwrap();
        engine
            .event_manager_mut()
            .queue_event(QueuePosition::Back, VrEvent::named("Grab"))
            .unwrap();
        engine.tick(0.0).unwrap();
        assert_eq!(fsm.borrow().current_state_name(), "Held");
        assert!(engine.tokens().is_held("hand"));
    }
}
