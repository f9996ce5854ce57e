use engine::Vec3;
use tracing::{debug, info};

use super::collaborators::{HudLink, IndicatorSlot};
use super::hackable::AccessError;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorState {
    pub active: bool,
    /// World position the on-screen pointer tracks.
    pub target: Option<Vec3>,
}

/// Screen-state stand-in: what the overlay would draw, without drawing it.
#[derive(Debug, Clone, Default)]
pub struct HudState {
    indicators: Vec<IndicatorState>,
    static_transitions: u32,
    hackable_line: Option<String>,
    error_line: Option<String>,
    paused: bool,
    game_over: bool,
}

impl HudState {
    pub fn new(indicator_slots: usize) -> Self {
        Self {
            indicators: vec![IndicatorState::default(); indicator_slots],
            ..Self::default()
        }
    }

    pub fn indicator(&self, slot: IndicatorSlot) -> Option<&IndicatorState> {
        self.indicators.get(slot.0)
    }

    pub fn active_indicator_count(&self) -> usize {
        self.indicators.iter().filter(|state| state.active).count()
    }

    pub fn static_transitions(&self) -> u32 {
        self.static_transitions
    }

    pub fn hackable_line(&self) -> Option<&str> {
        self.hackable_line.as_deref()
    }

    pub fn error_line(&self) -> Option<&str> {
        self.error_line.as_deref()
    }

    pub fn show_error(&mut self, error: &AccessError) {
        self.error_line = Some(error.to_string());
    }

    pub fn clear_error(&mut self) {
        self.error_line = None;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            info!(paused, "pause_toggled");
        }
        self.paused = paused;
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn set_game_over(&mut self) {
        if !self.game_over {
            info!("game_over");
        }
        self.game_over = true;
    }
}

impl HudLink for HudState {
    fn claim_indicator(&mut self) -> Option<IndicatorSlot> {
        let index = self.indicators.iter().position(|state| !state.active)?;
        self.indicators[index] = IndicatorState {
            active: true,
            target: None,
        };
        debug!(slot = index, "indicator_claimed");
        Some(IndicatorSlot(index))
    }

    fn release_indicator(&mut self, slot: IndicatorSlot) {
        if let Some(state) = self.indicators.get_mut(slot.0) {
            *state = IndicatorState::default();
            debug!(slot = slot.0, "indicator_released");
        }
    }

    fn point_indicator(&mut self, slot: IndicatorSlot, target: Vec3) {
        if let Some(state) = self.indicators.get_mut(slot.0) {
            if state.active {
                state.target = Some(target);
            }
        }
    }

    fn show_static_transition(&mut self) {
        self.static_transitions = self.static_transitions.saturating_add(1);
        info!(count = self.static_transitions, "static_transition");
    }

    fn show_hackable_name(&mut self, room_name: &str, hackable_name: &str) {
        self.hackable_line = Some(format!("{room_name} / {hackable_name}"));
        info!(room = room_name, hackable = hackable_name, "hackable_name_shown");
    }

    fn is_halted(&self) -> bool {
        self.paused || self.game_over
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_pool_hands_out_lowest_free_slot() {
        let mut hud = HudState::new(2);
        let first = hud.claim_indicator().expect("first slot");
        let second = hud.claim_indicator().expect("second slot");
        assert_eq!((first, second), (IndicatorSlot(0), IndicatorSlot(1)));
        assert!(hud.claim_indicator().is_none());

        hud.release_indicator(first);
        assert_eq!(hud.claim_indicator(), Some(IndicatorSlot(0)));
    }

    #[test]
    fn pointing_requires_an_active_slot() {
        let mut hud = HudState::new(1);
        hud.point_indicator(IndicatorSlot(0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(hud.indicator(IndicatorSlot(0)).expect("slot").target, None);

        let slot = hud.claim_indicator().expect("slot");
        hud.point_indicator(slot, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(
            hud.indicator(slot).expect("slot").target,
            Some(Vec3::new(1.0, 0.0, 0.0))
        );
        hud.point_indicator(IndicatorSlot(5), Vec3::ZERO);
    }

    #[test]
    fn pause_and_game_over_both_halt() {
        let mut hud = HudState::new(0);
        assert!(!hud.is_halted());
        hud.set_paused(true);
        assert!(hud.is_halted());
        hud.set_paused(false);
        hud.set_game_over();
        assert!(hud.is_halted());
    }

    #[test]
    fn error_line_uses_access_error_message() {
        let mut hud = HudState::new(0);
        hud.show_error(&AccessError::Shielded);
        assert_eq!(
            hud.error_line(),
            Some("Error. System Protection Level Too High.")
        );
        hud.clear_error();
        assert_eq!(hud.error_line(), None);
    }
}
