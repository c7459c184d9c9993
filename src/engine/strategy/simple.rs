use crate::model::{CycleState, TokenConfig};

use super::{phase_step, Decision, Observed, Strategy};

/// Fixed cycle sizes, uniform random sizing within the configured
/// bounds. The default policy for new tokens.
pub struct Simple;

impl Strategy for Simple {
    fn decide(&self, config: &TokenConfig, cycle: &CycleState, obs: &Observed) -> Decision {
        phase_step(config, cycle, obs)
    }
}
