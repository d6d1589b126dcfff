//! Timing option tables

use super::EventKind;
use serde::{Deserialize, Serialize};

/// One manip the player can time: which event opens it and how long after
/// the item cue the response beep belongs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingOption {
    pub event: EventKind,
    pub name: String,
    pub timing_seconds: f64,
}

/// Target duration for the event phase of `event`
pub fn event_timing_seconds(event: EventKind) -> f64 {
    match event {
        EventKind::FoundItem => 1.3,
        EventKind::TradeShip => 2.1,
    }
}

/// Return all built-in timing options
pub fn get_timing_options() -> Vec<TimingOption> {
    let option = |event, name: &str, timing_seconds| TimingOption {
        event,
        name: name.to_string(),
        timing_seconds,
    };

    vec![
        option(EventKind::FoundItem, "B Item", 3.43),
        option(EventKind::FoundItem, "Idol / Hat / Berzerker", 6.06),
        option(EventKind::FoundItem, "Moonberry", 4.47),
        option(EventKind::FoundItem, "Wind Gem / Eye of Truth", 1.6),
        option(EventKind::TradeShip, "Trade 3B->4B", 2.14),
        option(EventKind::TradeShip, "Trade 3B->1A", 4.18),
    ]
}

/// Look up a timing option by its display name
pub fn get_timing_option(name: &str) -> Option<TimingOption> {
    get_timing_options().into_iter().find(|o| o.name == name)
}

/// The option used when nothing has been selected
pub fn default_timing_option() -> TimingOption {
    TimingOption {
        event: EventKind::FoundItem,
        name: "B Item".to_string(),
        timing_seconds: 3.43,
    }
}
