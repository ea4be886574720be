use glam::Vec3;
use std::time::Duration;

/// Distance of the preset views from the origin.
const SHORTCUT_DISTANCE: f32 = 8.0;

/// Preset camera views bound to the numeric keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewShortcut {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

impl ViewShortcut {
    pub const ALL: [ViewShortcut; 6] = [
        ViewShortcut::Front,
        ViewShortcut::Back,
        ViewShortcut::Left,
        ViewShortcut::Right,
        ViewShortcut::Top,
        ViewShortcut::Bottom,
    ];

    pub fn from_key(key: char) -> Option<Self> {
        match key {
            '8' => Some(ViewShortcut::Front),
            '2' => Some(ViewShortcut::Back),
            '4' => Some(ViewShortcut::Left),
            '6' => Some(ViewShortcut::Right),
            '5' => Some(ViewShortcut::Top),
            '0' => Some(ViewShortcut::Bottom),
            _ => None,
        }
    }

    pub fn position(self) -> Vec3 {
        let d = SHORTCUT_DISTANCE;
        match self {
            ViewShortcut::Front => Vec3::new(0.0, 0.0, d),
            ViewShortcut::Back => Vec3::new(0.0, 0.0, -d),
            ViewShortcut::Left => Vec3::new(-d, 0.0, 0.0),
            ViewShortcut::Right => Vec3::new(d, 0.0, 0.0),
            ViewShortcut::Top => Vec3::new(0.0, d, 0.0),
            ViewShortcut::Bottom => Vec3::new(0.0, -d, 0.0),
        }
    }

    /// Up vector; the vertical views need one off the view axis.
    pub fn up(self) -> Vec3 {
        match self {
            ViewShortcut::Top => Vec3::NEG_Z,
            ViewShortcut::Bottom => Vec3::Z,
            _ => Vec3::Y,
        }
    }
}

/// One sample of a running tween.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenFrame {
    pub position: Vec3,
    pub up: Vec3,
    pub target: Vec3,
    pub finished: bool,
}

/// Eased camera move from the current view to a preset, looking at the origin.
#[derive(Debug, Clone)]
pub struct CameraTween {
    from: TweenFrame,
    to: TweenFrame,
    start: Duration,
    duration: Duration,
}

impl CameraTween {
    pub const DURATION: Duration = Duration::from_secs(1);

    pub fn to_shortcut(
        shortcut: ViewShortcut,
        position: Vec3,
        up: Vec3,
        target: Vec3,
        now: Duration,
    ) -> Self {
        tracing::debug!(?shortcut, "view tween started");
        Self {
            from: TweenFrame {
                position,
                up,
                target,
                finished: false,
            },
            to: TweenFrame {
                position: shortcut.position(),
                up: shortcut.up(),
                target: Vec3::ZERO,
                finished: true,
            },
            start: now,
            duration: Self::DURATION,
        }
    }

    /// Camera placement at `now`. The final sample lands exactly on the preset.
    pub fn sample(&self, now: Duration) -> TweenFrame {
        let elapsed = now.saturating_sub(self.start);
        if elapsed >= self.duration {
            return self.to;
        }
        let t = ease_out_cubic(elapsed.as_secs_f32() / self.duration.as_secs_f32());
        let up = self.from.up.lerp(self.to.up, t);
        TweenFrame {
            position: self.from.position.lerp(self.to.position, t),
            // Opposite up vectors cancel out halfway; fall back to the goal.
            up: up.try_normalize().unwrap_or(self.to.up),
            target: self.from.target.lerp(self.to.target, t),
            finished: false,
        }
    }

    pub fn is_finished(&self, now: Duration) -> bool {
        now.saturating_sub(self.start) >= self.duration
    }
}

/// `1 - (1 - t)^3`, clamped to [0, 1].
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypad_layout() {
        let keys: Vec<char> = "824650".chars().collect();
        let shortcuts: Vec<ViewShortcut> = keys
            .iter()
            .filter_map(|k| ViewShortcut::from_key(*k))
            .collect();
        assert_eq!(shortcuts, ViewShortcut::ALL.to_vec());
    }

    #[test]
    fn presets_sit_eight_units_out() {
        for shortcut in ViewShortcut::ALL {
            assert!((shortcut.position().length() - 8.0).abs() < 1e-6);
            assert!(shortcut.up().dot(shortcut.position()).abs() < 1e-6);
        }
        assert_eq!(ViewShortcut::Top.up(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn easing_curve() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!((ease_out_cubic(0.5) - 0.875).abs() < 1e-6);
        assert_eq!(ease_out_cubic(3.0), 1.0);
    }

    #[test]
    fn tween_lands_on_preset() {
        let start = Duration::from_secs(5);
        let tween = CameraTween::to_shortcut(
            ViewShortcut::Right,
            Vec3::new(10.0, 10.0, 10.0),
            Vec3::Y,
            Vec3::new(1.0, 0.0, 0.0),
            start,
        );
        let mid = tween.sample(start + Duration::from_millis(500));
        assert!(!mid.finished);
        assert!((mid.position - Vec3::new(8.25, 1.25, 1.25)).length() < 1e-4);

        let end = tween.sample(start + Duration::from_secs(2));
        assert!(end.finished);
        assert_eq!(end.position, Vec3::new(8.0, 0.0, 0.0));
        assert_eq!(end.target, Vec3::ZERO);
        assert!(tween.is_finished(start + CameraTween::DURATION));
    }

    #[test]
    fn opposite_up_vectors_stay_normalized() {
        let tween = CameraTween::to_shortcut(
            ViewShortcut::Bottom,
            Vec3::new(0.0, 8.0, 0.0),
            Vec3::NEG_Z,
            Vec3::ZERO,
            Duration::ZERO,
        );
        for ms in (0..1000).step_by(50) {
            let frame = tween.sample(Duration::from_millis(ms));
            assert!((frame.up.length() - 1.0).abs() < 1e-4);
        }
    }
}
