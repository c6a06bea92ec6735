//! Combat system - cannon fire, damage, hit detection

/// Cannon characteristics
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: f32,
    /// Maximum hitscan range
    pub range: f32,
    /// Cooldown between shots, in ticks
    pub cooldown_ticks: u32,
}

impl WeaponStats {
    pub fn standard() -> Self {
        Self {
            damage: 25.0,
            range: 600.0,
            cooldown_ticks: 15,
        }
    }
}

/// Combat resolution helpers
pub struct CombatSystem;

impl CombatSystem {
    /// Whether the cannon is ready
    pub fn can_fire(cooldown_ticks: u32) -> bool {
        cooldown_ticks == 0
    }

    /// Apply damage, returning (new_health, killed)
    pub fn apply_damage(health: f32, damage: f32) -> (f32, bool) {
        let new_health = (health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }

    /// Distance along a hitscan ray at which a circle is hit
    ///
    /// The ray starts at (ox, oy) with direction `angle`. Returns the
    /// distance to the closest intersection within `range`, or None when the
    /// target is missed, behind the muzzle or out of range.
    pub fn ray_hit_distance(
        ox: f32,
        oy: f32,
        angle: f32,
        range: f32,
        tx: f32,
        ty: f32,
        radius: f32,
    ) -> Option<f32> {
        let dx = angle.cos();
        let dy = angle.sin();

        // Project the target center onto the ray
        let to_x = tx - ox;
        let to_y = ty - oy;
        let along = to_x * dx + to_y * dy;
        if along < 0.0 {
            return None;
        }

        // Perpendicular miss distance
        let closest_x = ox + dx * along;
        let closest_y = oy + dy * along;
        let px = tx - closest_x;
        let py = ty - closest_y;
        let perp_sq = px * px + py * py;
        if perp_sq > radius * radius {
            return None;
        }

        // Back up from the closest approach to the circle's near edge
        let back = (radius * radius - perp_sq).sqrt();
        let hit = (along - back).max(0.0);
        if hit > range {
            return None;
        }
        Some(hit)
    }
}
