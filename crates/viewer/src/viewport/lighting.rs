use glam::Vec3;

/// Point light without distance attenuation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub intensity: f32,
    /// Distance falloff exponent; 0 keeps intensity constant while zooming
    pub decay: f32,
}

/// Ambient light plus four corner point lights, rescaled to each model
#[derive(Clone, Debug, PartialEq)]
pub struct LightRig {
    pub ambient: f32,
    pub points: [PointLight; 4],
}

const FRONT_INTENSITY: f32 = 0.3;
const BACK_INTENSITY: f32 = 0.45;
const MIN_SCALE: f32 = 5.0;

impl Default for LightRig {
    fn default() -> Self {
        Self::fit(MIN_SCALE)
    }
}

impl LightRig {
    /// Place the lights on cube corners scaled by `max(5, max_dim)`
    pub fn fit(max_dim: f32) -> Self {
        let s = if max_dim.is_finite() { max_dim.max(MIN_SCALE) } else { MIN_SCALE };
        let light = |x: f32, y: f32, z: f32, intensity: f32| PointLight {
            position: Vec3::new(x, y, z) * s,
            intensity,
            decay: 0.0,
        };

        Self {
            ambient: 1.0,
            points: [
                light(1.0, 1.0, 1.0, FRONT_INTENSITY),
                light(-1.0, -1.0, 1.0, FRONT_INTENSITY),
                light(-1.0, 1.0, -1.0, BACK_INTENSITY),
                light(1.0, -1.0, -1.0, BACK_INTENSITY),
            ],
        }
    }

    pub fn scale(&self) -> f32 {
        self.points[0].position.x.abs()
    }
}
