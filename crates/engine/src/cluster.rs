use minvr_events::VrEvent;

/// Errors reported by a cluster node.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("cluster node is not initialized")]
    NotInitialized,
    #[error("cluster connection failed: {0}")]
    Connection(String),
    #[error("cluster protocol error: {0}")]
    Protocol(String),
}

/// One node of a multi-display cluster that renders in lock step.
///
/// Every node must see the same event queue each frame and swap buffers at the
/// same time. Implementations own the transport; the engine only calls these
/// hooks at the right points of the frame.
pub trait ClusterNode {
    fn initialize(&mut self) -> Result<(), ClusterError>;

    /// Replace `events` with the queue every node will process this frame.
    ///
    /// On entry it holds this node's cluster-safe input. On return it must be
    /// identical on every node.
    fn synchronize_input_events(&mut self, events: &mut Vec<VrEvent>) -> Result<(), ClusterError>;

    /// Block until every node has finished drawing the current frame.
    fn synchronize_frame_boundary(&mut self) -> Result<(), ClusterError>;

    fn shutdown(&mut self) -> Result<(), ClusterError>;
}

/// A cluster of one. Every hook succeeds and leaves the events untouched.
#[derive(Debug, Default)]
pub struct StandaloneNode;

impl ClusterNode for StandaloneNode {
    fn initialize(&mut self) -> Result<(), ClusterError> {
        Ok(())
    }

    fn synchronize_input_events(&mut self, _events: &mut Vec<VrEvent>) -> Result<(), ClusterError> {
        Ok(())
    }

    fn synchronize_frame_boundary(&mut self) -> Result<(), ClusterError> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ClusterError> {
        Ok(())
    }
}
