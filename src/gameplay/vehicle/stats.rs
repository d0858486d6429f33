use crate::config::BaseStatsConfig;

const UPGRADE_STEP_PER_LEVEL: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpgradeKind {
    Speed,
    Acceleration,
    Handling,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 3] = [
        UpgradeKind::Speed,
        UpgradeKind::Acceleration,
        UpgradeKind::Handling,
    ];

    pub fn label(self) -> &'static str {
        match self {
            UpgradeKind::Speed => "speed",
            UpgradeKind::Acceleration => "acceleration",
            UpgradeKind::Handling => "handling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BikeStats {
    pub max_speed: f32,
    pub acceleration: f32,
    pub turn_rate: f32,
    pub brake_force: f32,
    pub handling: f32,
    pub weight: f32,
}

impl Default for BikeStats {
    fn default() -> Self {
        Self::from(&BaseStatsConfig::default())
    }
}

impl From<&BaseStatsConfig> for BikeStats {
    fn from(config: &BaseStatsConfig) -> Self {
        Self {
            max_speed: config.max_speed,
            acceleration: config.acceleration,
            turn_rate: config.turn_rate,
            brake_force: config.brake_force,
            handling: config.handling,
            weight: config.weight,
        }
    }
}

impl BikeStats {
    pub fn with_upgrade(&self, base: &BikeStats, kind: UpgradeKind, level: u32) -> BikeStats {
        let factor = upgrade_factor(level);
        let mut next = *self;
        match kind {
            UpgradeKind::Speed => next.max_speed = base.max_speed * factor,
            UpgradeKind::Acceleration => next.acceleration = base.acceleration * factor,
            UpgradeKind::Handling => {
                next.handling = base.handling * factor;
                next.turn_rate = base.turn_rate * factor;
            }
        }
        next
    }
}

fn upgrade_factor(level: u32) -> f32 {
    1.0 + level as f32 * UPGRADE_STEP_PER_LEVEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_upgrade_scales_only_max_speed() {
        let base = BikeStats::default();
        let upgraded = base.with_upgrade(&base, UpgradeKind::Speed, 2);

        assert!((upgraded.max_speed - base.max_speed * 1.2).abs() < 1e-4);
        assert_eq!(upgraded.acceleration, base.acceleration);
        assert_eq!(upgraded.turn_rate, base.turn_rate);
    }

    #[test]
    fn handling_upgrade_scales_handling_and_turn_rate() {
        let base = BikeStats::default();
        let upgraded = base.with_upgrade(&base, UpgradeKind::Handling, 3);

        assert!((upgraded.handling - base.handling * 1.3).abs() < 1e-4);
        assert!((upgraded.turn_rate - base.turn_rate * 1.3).abs() < 1e-3);
        assert_eq!(upgraded.max_speed, base.max_speed);
    }

    #[test]
    fn repeated_upgrades_do_not_compound() {
        let base = BikeStats::default();
        let once = base.with_upgrade(&base, UpgradeKind::Acceleration, 1);
        let again = once.with_upgrade(&base, UpgradeKind::Acceleration, 1);

        assert_eq!(once, again);
    }

    #[test]
    fn level_zero_restores_base_value() {
        let base = BikeStats::default();
        let upgraded = base
            .with_upgrade(&base, UpgradeKind::Speed, 4)
            .with_upgrade(&base, UpgradeKind::Speed, 0);

        assert_eq!(upgraded.max_speed, base.max_speed);
    }
}
