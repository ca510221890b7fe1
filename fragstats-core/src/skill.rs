//! Skill rating engine
//!
//! Pure ELO-style rating updates applied to each kill. Both entry points are
//! side-effect free and total over finite inputs; the caller is responsible
//! for reading current ratings and persisting the results.
//!
//! A kill counts as a win (actual score 1) for the killer and a loss (actual
//! score 0) for the victim. The weapon modifier and the headshot bonus scale
//! the killer's gain only, never the victim's loss, so ratings converge
//! toward each other over repeated even matchups.

/// K-factor: how quickly ratings move.
pub const K_FACTOR: f64 = 32.0;

/// Gain multiplier applied on headshot kills.
pub const HEADSHOT_BONUS: f64 = 1.25;

/// Ratings never drop below this floor.
pub const MIN_SKILL: f64 = 0.0;

/// New rating for a killer after a kill.
///
/// `weapon_modifier` is unconstrained; values below zero invert the gain
/// (operator data decision, warned about at weapon load time).
pub fn kill_rating(
    killer_skill: f64,
    victim_skill: f64,
    weapon_modifier: f64,
    headshot: bool,
) -> f64 {
    let expected = expected_score(killer_skill, victim_skill);

    // Actual score is 1 for a kill
    let mut change = K_FACTOR * (1.0 - expected);
    change *= weapon_modifier;
    if headshot {
        change *= HEADSHOT_BONUS;
    }

    (killer_skill + change).max(MIN_SKILL)
}

/// New rating for a victim after dying.
pub fn death_rating(victim_skill: f64, killer_skill: f64) -> f64 {
    let expected = expected_score(victim_skill, killer_skill);

    // Actual score is 0 for a death, so the change is always <= 0
    let change = K_FACTOR * (0.0 - expected);

    (victim_skill + change).max(MIN_SKILL)
}

/// Probability of the player beating the opponent under the ELO model.
fn expected_score(player_skill: f64, opponent_skill: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_skill - player_skill) / 400.0))
}
