//! Cue sequencing: which tone to listen for, and when the response is due

mod options;
mod session;

pub use options::{
    default_timing_option, event_timing_seconds, get_timing_option, get_timing_options,
    TimingOption,
};
pub use session::{CueEvent, CueSession, SessionConfig, TimeoutPolicy};

use crate::detect::{CLOSE_MENU, FOUND_ITEM, TRADE_SHIP};
use serde::{Deserialize, Serialize};

/// Which half of a full cue cycle is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueMode {
    /// Timing the in-game event (found item jingle, trade ship)
    Event,

    /// Timing the item itself
    Item,
}

impl CueMode {
    pub fn alternate(self) -> Self {
        match self {
            CueMode::Event => CueMode::Item,
            CueMode::Item => CueMode::Event,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueState {
    AwaitingFirstTone,
    CueingSecondTone,
    HeardSecondTone,
}

/// In-game event that opens a manip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    FoundItem,
    TradeShip,
}

/// Name of the fingerprint that matters in the given state
pub fn select_fingerprint(state: CueState, mode: CueMode, event: EventKind) -> &'static str {
    match (mode, state, event) {
        (CueMode::Event, CueState::CueingSecondTone, _) => CLOSE_MENU,
        (_, CueState::AwaitingFirstTone, EventKind::TradeShip) => TRADE_SHIP,
        _ => FOUND_ITEM,
    }
}

/// Render a signed timing error as `+123ms` / `-45ms`
pub fn format_timing_error(difference: f64) -> String {
    let sign = if difference < 0.0 { '-' } else { '+' };
    format!("{}{}ms", sign, (difference.abs() * 1000.0).trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_menu_while_event_is_cueing() {
        for event in [EventKind::FoundItem, EventKind::TradeShip] {
            assert_eq!(
                select_fingerprint(CueState::CueingSecondTone, CueMode::Event, event),
                CLOSE_MENU
            );
        }
    }

    #[test]
    fn trade_ship_opens_trade_manips() {
        for mode in [CueMode::Event, CueMode::Item] {
            assert_eq!(
                select_fingerprint(CueState::AwaitingFirstTone, mode, EventKind::TradeShip),
                TRADE_SHIP
            );
        }
        assert_eq!(
            select_fingerprint(CueState::CueingSecondTone, CueMode::Item, EventKind::TradeShip),
            FOUND_ITEM
        );
    }

    #[test]
    fn found_item_otherwise() {
        assert_eq!(
            select_fingerprint(CueState::AwaitingFirstTone, CueMode::Event, EventKind::FoundItem),
            FOUND_ITEM
        );
        assert_eq!(
            select_fingerprint(CueState::HeardSecondTone, CueMode::Item, EventKind::FoundItem),
            FOUND_ITEM
        );
    }

    #[test]
    fn timing_error_formatting() {
        assert_eq!(format_timing_error(0.0505), "+50ms");
        assert_eq!(format_timing_error(-0.0459), "-45ms");
        assert_eq!(format_timing_error(0.0), "+0ms");
        assert_eq!(format_timing_error(-1.25), "-1250ms");
    }

    #[test]
    fn modes_alternate() {
        assert_eq!(CueMode::Event.alternate(), CueMode::Item);
        assert_eq!(CueMode::Item.alternate(), CueMode::Event);
    }
}
