use glam::{Vec3, Vec4};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Pitch parameters in SI units.
#[derive(Debug, Clone)]
pub struct PitchDesc {
    pub mass: f32,
    pub radius: f32,
    pub air_density: f32,
    pub gravity: f32,

    pub initial_speed: f32,
    pub spin_rpm: f32,

    pub drag_coeff: f32,
    /// Small lateral force from seam orientation (arm-side run).
    pub seam_shifted_wake_coeff: f32,

    pub initial_position: Vec3,
    pub spin_axis: Vec3,
    pub initial_velocity: Vec3,
}

impl Default for PitchDesc {
    fn default() -> Self {
        Self {
            mass: 0.145,
            radius: 0.0366,
            air_density: 1.225,
            gravity: 9.81,
            initial_speed: 44.7,
            spin_rpm: 2400.0,
            drag_coeff: 0.35,
            seam_shifted_wake_coeff: 0.05,
            initial_position: Vec3::new(0.0, 2.2, 0.0),
            spin_axis: Vec3::X,
            initial_velocity: Vec3::new(0.0, -2.0, 44.7),
        }
    }
}

/// Ball-flight integrator for a pitched ball: drag, Magnus lift,
/// seam-shifted wake and gravity under semi-implicit Euler.
pub struct PitchSimulator {
    desc: PitchDesc,
    rng: SmallRng,

    position: Vec3,
    velocity: Vec3,
    axis_angle: Vec4,

    time: f32,
    ball_area: f32,
    lift_coeff: f32,
    spin_radians_per_second: f32,
}

impl PitchSimulator {
    pub fn new(desc: PitchDesc) -> Self {
        Self::with_seed(desc, 0)
    }

    /// Seeded constructor so knuckleball runs can be replayed.
    pub fn with_seed(desc: PitchDesc, seed: u64) -> Self {
        let position = desc.initial_position;
        let velocity = desc.initial_velocity;
        Self {
            desc,
            rng: SmallRng::seed_from_u64(seed),
            position,
            velocity,
            axis_angle: Vec4::new(1.0, 0.0, 0.0, 0.0),
            time: 0.0,
            ball_area: 0.0,
            lift_coeff: 0.0,
            spin_radians_per_second: 0.0,
        }
    }

    /// Vortex-shedding fluctuation used in place of the steady wake
    /// coefficient when the ball barely spins: a 20 Hz oscillation plus
    /// bounded noise, both amplified as rpm drops.
    fn fluctuating_wake_coeff(&mut self, time: f32) -> f32 {
        let base = 0.5 * (20.0 * time).sin();
        let noise: f32 = self.rng.gen_range(-0.01..=0.01);
        let factor = 100.0 / self.desc.spin_rpm;
        (base + noise) * factor
    }

    pub fn simulate(&mut self, dt: f32) {
        let spin_axis = self.desc.spin_axis.normalize_or_zero();

        // Derived quantities are captured lazily on the first step so a
        // descriptor swap before the pitch takes effect.
        if self.time <= 0.0 {
            self.position = self.desc.initial_position;
            self.velocity = self.desc.initial_velocity;
            self.axis_angle = Vec4::new(1.0, 0.0, 0.0, 0.0);

            self.ball_area = std::f32::consts::PI * self.desc.radius * self.desc.radius;
            self.spin_radians_per_second = self.desc.spin_rpm * 2.0 * std::f32::consts::PI / 60.0;
            let spin_factor =
                self.desc.radius * self.spin_radians_per_second / self.desc.initial_speed;
            self.lift_coeff = 1.6 * spin_factor;
        }

        let speed = self.velocity.length();
        if speed < 0.1 {
            return;
        }
        let speed_sq = speed * speed;
        let dynamic_pressure = 0.5 * self.desc.air_density * self.ball_area * speed_sq;

        let drag_accel =
            self.velocity / speed * (-dynamic_pressure * self.desc.drag_coeff / self.desc.mass);

        let magnus_accel = spin_axis.cross(self.velocity).normalize_or_zero()
            * (dynamic_pressure * self.lift_coeff / self.desc.mass);

        let mut wake_coeff = self.desc.seam_shifted_wake_coeff;
        if self.desc.spin_rpm <= 100.0 {
            wake_coeff = self.fluctuating_wake_coeff(self.time);
        }
        let wake_accel = Vec3::new(dynamic_pressure * wake_coeff / self.desc.mass, 0.0, 0.0);

        let gravity_accel = Vec3::new(0.0, -self.desc.gravity, 0.0);

        let total_accel = drag_accel + magnus_accel + wake_accel + gravity_accel;
        self.velocity += total_accel * dt;
        self.position += self.velocity * dt;

        self.axis_angle = Vec4::new(
            spin_axis.x,
            spin_axis.y,
            spin_axis.z,
            self.axis_angle.w + self.spin_radians_per_second * dt,
        );
        self.time += dt;
    }

    pub fn reset(&mut self) {
        self.time = 0.0;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn axis_angle(&self) -> Vec4 {
        self.axis_angle
    }
}
