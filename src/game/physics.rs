//! Tank physics and movement constraints

/// Tank physics constants
#[derive(Debug, Clone, Copy)]
pub struct TankStats {
    /// Maximum forward speed
    pub max_speed: f32,
    /// Acceleration rate
    pub acceleration: f32,
    /// Deceleration/drag coefficient
    pub drag: f32,
    /// Hull turn rate in radians per second
    pub turn_rate: f32,
    /// Maximum health
    pub max_health: f32,
    /// Tank hitbox radius
    pub hitbox_radius: f32,
}

impl TankStats {
    /// The arena runs a single balanced chassis
    pub fn standard() -> Self {
        Self {
            max_speed: 220.0,
            acceleration: 180.0,
            drag: 0.92,
            turn_rate: 2.5,
            max_health: 100.0,
            hitbox_radius: 18.0,
        }
    }
}

/// Physics system for updating tank positions and velocities
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Update a tank's physics based on input
    /// Returns (new_x, new_y, new_orientation, new_vel_x, new_vel_y)
    pub fn update_tank(
        x: f32,
        y: f32,
        orientation: f32,
        vel_x: f32,
        vel_y: f32,
        throttle: f32,
        steer: f32,
        stats: &TankStats,
        dt: f32,
    ) -> (f32, f32, f32, f32, f32) {
        // Clamp inputs
        let throttle = throttle.clamp(-1.0, 1.0);
        let steer = steer.clamp(-1.0, 1.0);

        // Update hull orientation
        let new_orientation = orientation + steer * stats.turn_rate * dt;
        // Normalize to 0..2π
        let new_orientation = new_orientation.rem_euclid(std::f32::consts::TAU);

        // Thrust along the hull direction
        let thrust_x = new_orientation.cos();
        let thrust_y = new_orientation.sin();

        // Reverse drives at reduced power
        let thrust_power = if throttle >= 0.0 {
            throttle * stats.acceleration
        } else {
            throttle * stats.acceleration * 0.5
        };

        // Update velocity with thrust and drag
        let mut new_vel_x = vel_x + thrust_x * thrust_power * dt;
        let mut new_vel_y = vel_y + thrust_y * thrust_power * dt;

        new_vel_x *= stats.drag;
        new_vel_y *= stats.drag;

        // Clamp to max speed
        let speed = (new_vel_x * new_vel_x + new_vel_y * new_vel_y).sqrt();
        if speed > stats.max_speed {
            let scale = stats.max_speed / speed;
            new_vel_x *= scale;
            new_vel_y *= scale;
        }

        let new_x = x + new_vel_x * dt;
        let new_y = y + new_vel_y * dt;

        (new_x, new_y, new_orientation, new_vel_x, new_vel_y)
    }

    /// Check collision between two tanks
    pub fn check_tank_collision(
        x1: f32,
        y1: f32,
        radius1: f32,
        x2: f32,
        y2: f32,
        radius2: f32,
    ) -> bool {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist_sq = dx * dx + dy * dy;
        let combined_radius = radius1 + radius2;
        dist_sq <= combined_radius * combined_radius
    }

    /// Resolve collision between two tanks (pushes them apart)
    /// Returns ((new_x1, new_y1), (new_x2, new_y2))
    pub fn resolve_tank_collision(
        x1: f32,
        y1: f32,
        radius1: f32,
        x2: f32,
        y2: f32,
        radius2: f32,
    ) -> ((f32, f32), (f32, f32)) {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist < 0.001 {
            // Same position, push apart along x
            return ((x1 - radius1, y1), (x2 + radius2, y2));
        }

        let combined_radius = radius1 + radius2;
        let overlap = combined_radius - dist;

        if overlap <= 0.0 {
            return ((x1, y1), (x2, y2)); // No collision
        }

        let nx = dx / dist;
        let ny = dy / dist;

        // Push apart by half the overlap each, plus a small buffer
        let push = overlap / 2.0 + 0.1;

        (
            (x1 - nx * push, y1 - ny * push),
            (x2 + nx * push, y2 + ny * push),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const DT: f32 = 1.0 / 30.0;

    #[test]
    fn full_throttle_accelerates_forward() {
        let stats = TankStats::standard();
        let (x, _y, orientation, vel_x, _vel_y) =
            PhysicsSystem::update_tank(0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, &stats, DT);

        assert!(x > 0.0);
        assert!(vel_x > 0.0);
        assert_approx_eq!(orientation, 0.0);
    }

    #[test]
    fn idle_tank_coasts_to_a_stop() {
        let stats = TankStats::standard();
        let mut state = (0.0, 0.0, 0.0, 100.0, 0.0);
        for _ in 0..300 {
            state = PhysicsSystem::update_tank(
                state.0, state.1, state.2, state.3, state.4, 0.0, 0.0, &stats, DT,
            );
        }
        assert!(state.3.abs() < 0.5, "vel_x still {}", state.3);
    }

    #[test]
    fn speed_is_clamped_to_max() {
        let stats = TankStats::standard();
        let mut state = (0.0, 0.0, 0.0, 0.0, 0.0);
        for _ in 0..600 {
            state = PhysicsSystem::update_tank(
                state.0, state.1, state.2, state.3, state.4, 1.0, 0.0, &stats, DT,
            );
        }
        let speed = (state.3 * state.3 + state.4 * state.4).sqrt();
        assert!(speed <= stats.max_speed + 0.001);
    }

    #[test]
    fn steering_wraps_orientation() {
        let stats = TankStats::standard();
        let mut orientation = 0.1;
        for _ in 0..200 {
            let next = PhysicsSystem::update_tank(
                0.0, 0.0, orientation, 0.0, 0.0, 0.0, -1.0, &stats, DT,
            );
            orientation = next.2;
            assert!((0.0..std::f32::consts::TAU).contains(&orientation));
        }
    }

    #[test]
    fn inputs_are_clamped() {
        let stats = TankStats::standard();
        let sane = PhysicsSystem::update_tank(0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, &stats, DT);
        let wild = PhysicsSystem::update_tank(0.0, 0.0, 0.0, 0.0, 0.0, 50.0, 0.0, &stats, DT);
        assert_approx_eq!(sane.3, wild.3);
    }

    #[test]
    fn collision_detection_uses_combined_radius() {
        assert!(PhysicsSystem::check_tank_collision(
            0.0, 0.0, 10.0, 15.0, 0.0, 10.0
        ));
        assert!(!PhysicsSystem::check_tank_collision(
            0.0, 0.0, 10.0, 25.0, 0.0, 10.0
        ));
    }

    #[test]
    fn collision_resolution_separates_tanks() {
        let ((x1, y1), (x2, y2)) =
            PhysicsSystem::resolve_tank_collision(0.0, 0.0, 10.0, 5.0, 0.0, 10.0);
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist = (dx * dx + dy * dy).sqrt();
        assert!(dist >= 20.0);
        assert_approx_eq!(y1, 0.0);
        assert_approx_eq!(y2, 0.0);
    }
}
