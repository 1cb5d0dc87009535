/// Position and rotation of a virtual entity for one encode call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Body yaw in degrees
    pub yaw: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Head pitch in degrees (spawn packets only)
    pub head_pitch: f32,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    /// Set yaw and pitch
    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    pub fn with_head_pitch(mut self, head_pitch: f32) -> Self {
        self.head_pitch = head_pitch;
        self
    }

    /// Same rotation, shifted position
    pub fn offset(mut self, dx: f64, dy: f64, dz: f64) -> Self {
        self.x += dx;
        self.y += dy;
        self.z += dz;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_builders() {
        let pose = Pose::new(1.0, 64.0, -3.5)
            .with_rotation(90.0, 10.0)
            .with_head_pitch(5.0)
            .offset(0.0, 2.5, 0.0);
        assert_eq!(pose.y, 66.5);
        assert_eq!(pose.yaw, 90.0);
        assert_eq!(pose.pitch, 10.0);
        assert_eq!(pose.head_pitch, 5.0);
    }
}
