//! Population dynamics.
//!
//! Population grows with the growth attribute and is culled in proportion
//! to heat (danger not covered by military). It never drops below 1.

/// Lowest possible population.
pub const MIN_POPULATION: f64 = 1.0;

/// `max(danger - military, 1)`. Military does not count during the boss fight.
pub fn heat(danger: f64, military: f64, boss_fight: bool) -> f64 {
    let military = if boss_fight { 0.0 } else { military };
    (danger - military).max(1.0)
}

/// Change per second: `growth - population * decay * heat`.
pub fn population_delta(growth: f64, population: f64, heat: f64, decay: f64, boss_fight: bool) -> f64 {
    let growth = if boss_fight { 0.0 } else { growth };
    growth - population * decay * heat
}

/// Population after one step of `delta * speed`, floored at [`MIN_POPULATION`].
pub fn next_population(population: f64, delta: f64, speed: f64) -> f64 {
    (population + delta * speed).max(MIN_POPULATION)
}

/// The station is lost when the boss fight drives population to 1.
pub fn is_wiped_out(population: f64) -> bool {
    population.round() <= MIN_POPULATION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heat_floor() {
        assert_eq!(heat(10.0, 3.0, false), 7.0);
        assert_eq!(heat(2.0, 30.0, false), 1.0);
        assert_eq!(heat(10.0, 30.0, true), 10.0);
    }

    #[test]
    fn test_population_floor() {
        let delta = population_delta(0.0, 5.0, 100.0, 0.01, false);
        assert!(delta < 0.0);
        assert_eq!(next_population(5.0, delta, 1.0), MIN_POPULATION);
    }

    #[test]
    fn test_growth_ignored_in_boss_fight() {
        assert_eq!(population_delta(50.0, 10.0, 1.0, 0.01, true), -0.1);
        assert_eq!(population_delta(50.0, 10.0, 1.0, 0.01, false), 49.9);
    }

    #[test]
    fn test_equilibrium() {
        // growth = pop * decay * heat
        let delta = population_delta(2.0, 100.0, 2.0, 0.01, false);
        assert!(delta.abs() < 1e-12);
    }

    #[test]
    fn test_wiped_out() {
        assert!(is_wiped_out(1.0));
        assert!(is_wiped_out(1.4));
        assert!(!is_wiped_out(1.6));
    }
}
