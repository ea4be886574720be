use mipview_persist::CameraPose;

/// Camera interaction signals from the orbit controls.
///
/// `Change` and `End` carry the live camera sampled at the time of the
/// signal: its position and rotation plus the controls' orbit target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEvent {
    Start,
    Change(CameraPose),
    End(CameraPose),
}

impl InteractionEvent {
    pub fn sample(&self) -> Option<CameraPose> {
        match self {
            InteractionEvent::Start => None,
            InteractionEvent::Change(pose) | InteractionEvent::End(pose) => Some(*pose),
        }
    }
}
