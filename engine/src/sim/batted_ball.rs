use glam::{Vec3, Vec4};

/// Batted-ball parameters in SI units. The aero fields match the pitch
/// descriptor; the contact fields drive the bounce/roll phase and the
/// bat-ball collision model.
#[derive(Debug, Clone)]
pub struct BattedBallDesc {
    pub ball_mass: f32,
    pub bat_mass: f32,

    pub radius: f32,
    pub air_density: f32,
    pub gravity: f32,

    pub initial_speed: f32,
    pub spin_rpm: f32,

    pub drag_coeff: f32,
    pub seam_shifted_wake_coeff: f32,

    /// Magnus lift coefficient; carried in the descriptor for tuning
    /// even though flight uses the spin-derived value.
    pub lift_coeff: f32,
    pub restitution_coeff: f32,
    pub friction_coeff: f32,

    pub initial_position: Vec3,
    pub spin_axis: Vec3,
    pub initial_velocity: Vec3,
}

impl Default for BattedBallDesc {
    fn default() -> Self {
        Self {
            ball_mass: 0.145,
            bat_mass: 0.94,
            radius: 0.0366,
            air_density: 1.225,
            gravity: 9.81,
            initial_speed: 44.7,
            spin_rpm: 2400.0,
            drag_coeff: 0.35,
            seam_shifted_wake_coeff: 0.05,
            lift_coeff: 0.2,
            restitution_coeff: 0.3,
            friction_coeff: 0.3,
            initial_position: Vec3::new(0.0, 2.2, 0.0),
            spin_axis: Vec3::X,
            initial_velocity: Vec3::new(0.0, -2.0, 44.7),
        }
    }
}

/// Result of the bat-ball collision model.
#[derive(Debug, Clone, Copy)]
pub struct ExitParams {
    pub speed: f32,
    pub launch_angle_deg: f32,
    /// Exit spin in RPM per axis.
    pub spin: Vec3,
    pub velocity: Vec3,
}

/// Two-phase batted-ball integrator. Until the first ground contact
/// the ball flies under the same force model as a pitch (steady wake
/// coefficient, no knuckle fluctuation); afterwards it bounces and
/// rolls under gravity, restitution and Coulomb friction.
pub struct BattedBallSimulator {
    desc: BattedBallDesc,

    position: Vec3,
    velocity: Vec3,
    axis_angle: Vec4,

    time: f32,
    ball_area: f32,
    lift_coeff: f32,
    spin_radians_per_second: f32,

    num_bounces: u32,
    curr_spin: Vec3,
    tangential_velocity: Vec3,
}

impl BattedBallSimulator {
    pub fn new(desc: BattedBallDesc) -> Self {
        let position = desc.initial_position;
        let velocity = desc.initial_velocity;
        Self {
            desc,
            position,
            velocity,
            axis_angle: Vec4::new(1.0, 0.0, 0.0, 0.0),
            time: 0.0,
            ball_area: 0.0,
            lift_coeff: 0.0,
            spin_radians_per_second: 0.0,
            num_bounces: 0,
            curr_spin: Vec3::ZERO,
            tangential_velocity: Vec3::ZERO,
        }
    }

    pub fn simulate(&mut self, dt: f32) {
        if self.num_bounces == 0 {
            self.simulate_flight(dt);
        } else {
            self.simulate_ground(dt);
        }
        self.time += dt;
    }

    fn simulate_flight(&mut self, dt: f32) {
        let spin_axis = self.desc.spin_axis.normalize_or_zero();

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

        let drag_accel = self.velocity / speed
            * (-dynamic_pressure * self.desc.drag_coeff / self.desc.ball_mass);
        let magnus_accel = spin_axis.cross(self.velocity).normalize_or_zero()
            * (dynamic_pressure * self.lift_coeff / self.desc.ball_mass);
        let wake_accel = Vec3::new(
            dynamic_pressure * self.desc.seam_shifted_wake_coeff / self.desc.ball_mass,
            0.0,
            0.0,
        );
        let gravity_accel = Vec3::new(0.0, -self.desc.gravity, 0.0);

        self.velocity += (drag_accel + magnus_accel + wake_accel + gravity_accel) * dt;
        self.position += self.velocity * dt;

        self.axis_angle = Vec4::new(
            spin_axis.x,
            spin_axis.y,
            spin_axis.z,
            self.axis_angle.w + self.spin_radians_per_second * dt,
        );

        // First ground contact flips the simulator into the
        // bounce/roll phase with a residual topspin.
        if self.position.y <= self.desc.radius {
            self.curr_spin = Vec3::new(0.0, 20.0, 0.0);
            self.num_bounces += 1;
        }
    }

    fn simulate_ground(&mut self, dt: f32) {
        self.velocity.y -= self.desc.gravity * dt;
        self.position += self.velocity * dt;

        let inertia = 0.4 * self.desc.ball_mass * self.desc.radius * self.desc.radius;

        if self.position.y <= self.desc.radius {
            self.position.y = self.desc.radius;
            self.velocity.y = -self.velocity.y * self.desc.restitution_coeff;

            // Velocity of the contact point at the bottom of the ball,
            // horizontal component only.
            let contact_velocity = self.velocity
                + self
                    .desc
                    .spin_axis
                    .cross(Vec3::new(0.0, -self.desc.radius, 0.0));
            self.tangential_velocity = Vec3::new(contact_velocity.x, 0.0, contact_velocity.z);

            if self.tangential_velocity.length() > 1.0e-4 {
                let friction_direction = -self.tangential_velocity.normalize();
                let friction_force =
                    self.desc.friction_coeff * self.desc.ball_mass * self.desc.gravity;
                let impulse = friction_direction * friction_force * dt;

                self.velocity += impulse / self.desc.ball_mass;

                let torque = Vec3::new(0.0, -self.desc.radius, 0.0).cross(impulse);
                self.curr_spin += torque / inertia;

                self.spin_radians_per_second = self.curr_spin.length();
                self.axis_angle = Vec4::new(
                    torque.x,
                    torque.y,
                    torque.z,
                    self.spin_radians_per_second * dt,
                );

                // Counts contact frames, not distinct bounces; callers
                // treat a large count as a rolling timeout.
                self.num_bounces += 1;
            }
        }
    }

    pub fn has_stopped(&self) -> bool {
        const VELOCITY_THRESHOLD: f32 = 0.1;
        (self.position.y - self.desc.radius).abs() < 1.0e-3
            && self.velocity.y.abs() < VELOCITY_THRESHOLD
            && self.tangential_velocity.length() < VELOCITY_THRESHOLD
    }

    pub fn reset(&mut self) {
        self.time = 0.0;
        self.num_bounces = 0;
    }

    /// Bat-ball collision: exit speed from the reduced-mass restitution
    /// model, exit spin from the contact offsets, launch angle from the
    /// exit velocity's elevation.
    pub fn compute_exit_params(
        &self,
        bat_speed: f32,
        bat_attack_angle_deg: f32,
        bat_horizontal_angle_deg: f32,
        vertical_offset: f32,
        horizontal_offset: f32,
    ) -> ExitParams {
        let attack = bat_attack_angle_deg.to_radians();
        let horizontal = bat_horizontal_angle_deg.to_radians();

        let bat_direction = Vec3::new(
            attack.cos() * horizontal.sin(),
            attack.sin(),
            attack.cos() * horizontal.cos(),
        );
        let bat_velocity = bat_direction * bat_speed;

        let reduced_mass = self.desc.bat_mass * self.desc.ball_mass
            / (self.desc.bat_mass + self.desc.ball_mass);
        let speed = (1.0 + self.desc.restitution_coeff) * reduced_mass / self.desc.ball_mass
            * bat_speed;
        let velocity = bat_velocity.normalize_or_zero() * speed;

        // Vertical offset shears sidespin, horizontal offset backspin.
        let mut spin = Vec3::new(
            -self.desc.friction_coeff * vertical_offset * bat_speed / self.desc.radius,
            self.desc.friction_coeff * horizontal_offset * bat_speed / self.desc.radius,
            0.0,
        );
        if spin.x == 0.0 && spin.y == 0.0 {
            spin.y = 1.0;
        }
        let spin_scale = 1000.0;
        spin *= spin_scale / (2.0 * std::f32::consts::PI);

        let launch_angle_deg = velocity
            .y
            .atan2((velocity.x * velocity.x + velocity.z * velocity.z).sqrt())
            .to_degrees();

        ExitParams {
            speed,
            launch_angle_deg,
            spin,
            velocity,
        }
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

    pub fn bounces(&self) -> u32 {
        self.num_bounces
    }

    pub fn current_spin(&self) -> Vec3 {
        self.curr_spin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn drop_desc() -> BattedBallDesc {
        // Straight drop in a vacuum: only gravity, restitution and
        // friction act.
        BattedBallDesc {
            air_density: 0.0,
            initial_position: Vec3::new(0.0, 2.0, 0.0),
            initial_velocity: Vec3::new(0.0, -2.0, 0.0),
            spin_axis: Vec3::X,
            ..BattedBallDesc::default()
        }
    }

    fn run_until_first_bounce(sim: &mut BattedBallSimulator, dt: f32) {
        for _ in 0..100_000 {
            sim.simulate(dt);
            if sim.bounces() > 0 {
                return;
            }
        }
        panic!("ball never reached the ground");
    }

    #[test]
    fn ground_contact_switches_phase_and_seeds_spin() {
        let mut sim = BattedBallSimulator::new(drop_desc());
        run_until_first_bounce(&mut sim, 0.001);
        assert_eq!(sim.bounces(), 1);
        assert_eq!(sim.current_spin(), Vec3::new(0.0, 20.0, 0.0));
    }

    #[test]
    fn rebound_height_follows_restitution() {
        let dt = 0.0005;
        let mut sim = BattedBallSimulator::new(drop_desc());
        run_until_first_bounce(&mut sim, dt);

        // Speed entering the first ground-phase contact.
        let impact_speed = sim.velocity().y.abs();

        // Step until the ball leaves the ground and track the apex.
        let mut apex = 0.0f32;
        for _ in 0..40_000 {
            sim.simulate(dt);
            apex = apex.max(sim.position().y);
        }
        let e = sim.desc.restitution_coeff;
        let predicted = sim.desc.radius + (e * impact_speed).powi(2) / (2.0 * sim.desc.gravity);
        // Loose band: discretization and the friction impulse both eat
        // into the apex.
        assert!(apex > 0.5 * predicted && apex < 1.5 * predicted.max(0.05));
    }

    #[test]
    fn friction_bleeds_horizontal_speed() {
        let desc = BattedBallDesc {
            initial_velocity: Vec3::new(3.0, -5.0, 0.0),
            ..drop_desc()
        };
        let mut sim = BattedBallSimulator::new(desc);
        let dt = 0.001;
        run_until_first_bounce(&mut sim, dt);
        for _ in 0..20_000 {
            sim.simulate(dt);
        }
        assert!(sim.velocity().x < 3.0);
        assert!(sim.velocity().x > -0.5);
    }

    #[test]
    fn rolling_contact_inflates_the_bounce_counter() {
        let desc = BattedBallDesc {
            initial_velocity: Vec3::new(3.0, -5.0, 0.0),
            ..drop_desc()
        };
        let mut sim = BattedBallSimulator::new(desc);
        let dt = 0.001;
        run_until_first_bounce(&mut sim, dt);
        for _ in 0..20_000 {
            sim.simulate(dt);
        }
        // Every ground-contact frame with tangential motion counts.
        assert!(sim.bounces() > 10);
    }

    #[test]
    fn has_stopped_thresholds() {
        let desc = BattedBallDesc::default();
        let radius = desc.radius;
        let mut sim = BattedBallSimulator::new(desc);
        sim.position = Vec3::new(4.0, radius + 5.0e-4, -12.0);
        sim.velocity = Vec3::new(0.0, 0.05, 0.0);
        sim.tangential_velocity = Vec3::new(0.05, 0.0, 0.05);
        assert!(sim.has_stopped());

        sim.velocity.y = 0.5;
        assert!(!sim.has_stopped());
        sim.velocity.y = 0.05;
        sim.position.y = radius + 0.1;
        assert!(!sim.has_stopped());
        sim.position.y = radius;
        sim.tangential_velocity = Vec3::new(0.2, 0.0, 0.0);
        assert!(!sim.has_stopped());
    }

    #[test]
    fn exit_speed_uses_the_reduced_mass() {
        let sim = BattedBallSimulator::new(BattedBallDesc::default());
        let exit = sim.compute_exit_params(30.0, 25.0, 0.0, 0.0, 0.0);
        let reduced = 0.94 * 0.145 / (0.94 + 0.145);
        let expected = 1.3 * reduced / 0.145 * 30.0;
        assert_relative_eq!(exit.speed, expected, epsilon = 1.0e-3);
        assert_relative_eq!(exit.velocity.length(), expected, epsilon = 1.0e-3);
    }

    #[test]
    fn launch_angle_tracks_the_attack_angle() {
        let sim = BattedBallSimulator::new(BattedBallDesc::default());
        let exit = sim.compute_exit_params(30.0, 25.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(exit.launch_angle_deg, 25.0, epsilon = 1.0e-2);
    }

    #[test]
    fn centered_contact_still_spins() {
        let sim = BattedBallSimulator::new(BattedBallDesc::default());
        let exit = sim.compute_exit_params(30.0, 10.0, 0.0, 0.0, 0.0);
        // Dead-center contact falls back to unit backspin before the
        // RPM conversion.
        assert_relative_eq!(
            exit.spin.y,
            1000.0 / (2.0 * std::f32::consts::PI),
            epsilon = 1.0e-2
        );
        assert_eq!(exit.spin.x, 0.0);
    }

    #[test]
    fn offset_contact_generates_spin() {
        let sim = BattedBallSimulator::new(BattedBallDesc::default());
        let exit = sim.compute_exit_params(30.0, 10.0, 0.0, 0.01, -0.02);
        // Vertical offset maps to x spin, horizontal to y.
        assert!(exit.spin.x < 0.0);
        assert!(exit.spin.y < 0.0);
    }

    #[test]
    fn reset_rearms_the_flight_phase() {
        let mut sim = BattedBallSimulator::new(drop_desc());
        run_until_first_bounce(&mut sim, 0.001);
        sim.reset();
        assert_eq!(sim.bounces(), 0);
        assert_eq!(sim.time(), 0.0);
        sim.simulate(0.001);
        assert_relative_eq!(sim.position().y, 2.0, epsilon = 1.0e-2);
    }
}
