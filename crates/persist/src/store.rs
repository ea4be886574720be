use crate::snapshot::{CameraPose, CameraSnapshot, PoseError, ProjectionMode};

/// Events produced by store mutations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreEvent {
    Committed { revision: u64 },
    Rejected,
    ProjectionToggled { projection: ProjectionMode },
    Reset,
}

/// Handle returned by [`CameraStateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&CameraSnapshot)>;

/// The single source of truth for the camera pose and projection mode.
///
/// Owned by the application and passed by reference to whoever needs it.
/// Writers are the sync controller, the projection toggle and the reset
/// action. Readers either poll [`CameraStateStore::revision`] or subscribe;
/// listeners run synchronously inside the mutating call.
pub struct CameraStateStore {
    pose: CameraPose,
    projection: ProjectionMode,
    revision: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    events: Vec<StoreEvent>,
}

impl std::fmt::Debug for CameraStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStateStore")
            .field("pose", &self.pose)
            .field("projection", &self.projection)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for CameraStateStore {
    fn default() -> Self {
        Self {
            pose: CameraPose::DEFAULT,
            projection: ProjectionMode::Perspective,
            revision: 0,
            listeners: Vec::new(),
            next_subscription: 0,
            events: Vec::new(),
        }
    }
}

impl CameraStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously persisted snapshot. Snapshots holding
    /// non-finite values are rejected.
    pub fn from_snapshot(snapshot: &CameraSnapshot) -> Result<Self, PoseError> {
        let pose = snapshot.pose();
        pose.validate()?;
        Ok(Self {
            pose,
            projection: snapshot.projection(),
            ..Self::default()
        })
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    pub fn projection(&self) -> ProjectionMode {
        self.projection
    }

    pub fn is_orthographic(&self) -> bool {
        self.projection.is_orthographic()
    }

    /// Bumped by every accepted mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot::new(self.pose, self.projection)
    }

    /// Overwrite the pose. Non-finite input is rejected and the previous pose
    /// is left intact.
    pub fn set_camera_state(&mut self, pose: CameraPose) -> Result<(), PoseError> {
        if let Err(e) = pose.validate() {
            tracing::warn!(error = %e, "camera commit rejected");
            self.events.push(StoreEvent::Rejected);
            return Err(e);
        }
        self.pose = pose;
        self.bump();
        tracing::debug!(
            revision = self.revision,
            position = ?pose.position,
            target = ?pose.target,
            "camera state committed"
        );
        self.events.push(StoreEvent::Committed {
            revision: self.revision,
        });
        Ok(())
    }

    /// Flip between perspective and orthographic. The pose is untouched.
    pub fn toggle_projection(&mut self) -> ProjectionMode {
        self.projection = self.projection.toggled();
        self.bump();
        tracing::info!(projection = ?self.projection, "projection toggled");
        self.events.push(StoreEvent::ProjectionToggled {
            projection: self.projection,
        });
        self.projection
    }

    /// Return the pose to [`CameraPose::DEFAULT`]. The projection is untouched.
    pub fn reset_position(&mut self) {
        self.pose = CameraPose::DEFAULT;
        self.bump();
        tracing::info!("camera position reset");
        self.events.push(StoreEvent::Reset);
    }

    /// Register a listener called with the new snapshot after every accepted
    /// mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&CameraSnapshot) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Drain and return all pending events.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    fn bump(&mut self) {
        self.revision += 1;
        let snapshot = self.snapshot();
        for (_, listener) in &mut self.listeners {
            listener(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pose(x: f32) -> CameraPose {
        CameraPose::new(Vec3::new(x, 1.0, 2.0), Vec3::new(0.1, 0.2, 0.3), Vec3::new(0.0, 0.5, 0.0))
    }

    #[test]
    fn reads_see_the_commit_immediately() {
        let mut store = CameraStateStore::new();
        store.set_camera_state(pose(3.0)).unwrap();
        assert_eq!(store.pose(), pose(3.0));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn non_finite_commit_keeps_previous_state() {
        let mut store = CameraStateStore::new();
        store.set_camera_state(pose(3.0)).unwrap();
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let err = store.set_camera_state(pose(bad)).unwrap_err();
            assert!(matches!(err, PoseError::NonFinite { field: "position", .. }));
        }
        assert_eq!(store.pose(), pose(3.0));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn toggle_is_pose_neutral() {
        let mut store = CameraStateStore::new();
        store.set_camera_state(pose(7.0)).unwrap();
        assert_eq!(store.toggle_projection(), ProjectionMode::Orthographic);
        assert_eq!(store.pose(), pose(7.0));
        assert!(store.is_orthographic());
        store.toggle_projection();
        assert_eq!(store.pose(), pose(7.0));
        assert!(!store.is_orthographic());
    }

    #[test]
    fn reset_restores_default_pose_and_keeps_projection() {
        let mut store = CameraStateStore::new();
        store.set_camera_state(pose(-4.0)).unwrap();
        store.toggle_projection();
        store.reset_position();
        assert_eq!(store.pose().position, Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(store.pose().rotation, Vec3::ZERO);
        assert_eq!(store.pose().target, Vec3::ZERO);
        assert!(store.is_orthographic());
    }

    #[test]
    fn listeners_receive_every_accepted_mutation() {
        let mut store = CameraStateStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = store.subscribe(move |s| sink.borrow_mut().push(*s));

        store.set_camera_state(pose(1.0)).unwrap();
        let _ = store.set_camera_state(pose(f32::NAN));
        store.toggle_projection();
        assert_eq!(seen.borrow().len(), 2);
        assert!(seen.borrow()[1].is_orthographic);
        assert_eq!(seen.borrow()[1].position, [1.0, 1.0, 2.0]);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.reset_position();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn events_record_mutations_in_order() {
        let mut store = CameraStateStore::new();
        store.set_camera_state(pose(1.0)).unwrap();
        let _ = store.set_camera_state(pose(f32::NAN));
        store.toggle_projection();
        store.reset_position();
        assert_eq!(
            store.drain_events(),
            vec![
                StoreEvent::Committed { revision: 1 },
                StoreEvent::Rejected,
                StoreEvent::ProjectionToggled {
                    projection: ProjectionMode::Orthographic
                },
                StoreEvent::Reset,
            ]
        );
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn from_snapshot_validates() {
        let mut snapshot = CameraSnapshot::new(pose(2.0), ProjectionMode::Orthographic);
        let store = CameraStateStore::from_snapshot(&snapshot).unwrap();
        assert_eq!(store.pose(), pose(2.0));
        assert!(store.is_orthographic());

        snapshot.target[1] = f32::NAN;
        assert!(CameraStateStore::from_snapshot(&snapshot).is_err());
    }
}
