//! Derives the end-of-stream scenario tag and UI decision from widget
//! output composition (§4.6), independent of any data-presence heuristics on
//! the client.

use crate::events::{Scenario, UiDecision};

/// Counts of successful widget results by domain, as produced by the
/// [`crate::widget_executor::WidgetExecutor`].
#[derive(Debug, Clone, Default)]
pub struct WidgetCounts {
    pub hotel: usize,
    pub product: usize,
    pub place: usize,
}

impl WidgetCounts {
    pub fn from_produced(produced: &[(&'static str, usize)]) -> Self {
        let mut counts = WidgetCounts::default();
        for (widget_type, count) in produced {
            match *widget_type {
                "hotel" => counts.hotel += count,
                "product" => counts.product += count,
                "place" => counts.place += count,
                _ => {}
            }
        }
        counts
    }
}

pub fn derive_scenario(counts: &WidgetCounts) -> Scenario {
    if counts.hotel == 1 {
        Scenario::HotelLookupSingle
    } else if counts.hotel > 1 {
        Scenario::HotelBrowse
    } else if counts.product > 0 {
        Scenario::ProductBrowse
    } else if counts.place > 0 {
        Scenario::PlaceBrowse
    } else {
        Scenario::GeneralAnswer
    }
}

pub fn derive_ui_decision(scenario: Scenario, counts: &WidgetCounts) -> UiDecision {
    let any_domain_widget = counts.hotel > 0 || counts.product > 0 || counts.place > 0;
    match scenario {
        Scenario::HotelLookupSingle => UiDecision { show_map: false, show_cards: false, show_images: true, show_comparison: false },
        Scenario::HotelBrowse => UiDecision { show_map: true, show_cards: true, show_images: false, show_comparison: true },
        Scenario::ProductBrowse => UiDecision { show_map: false, show_cards: true, show_images: true, show_comparison: true },
        Scenario::PlaceBrowse => UiDecision { show_map: true, show_cards: true, show_images: true, show_comparison: false },
        Scenario::GeneralAnswer => UiDecision { show_map: false, show_cards: any_domain_widget, show_images: false, show_comparison: false },
    }
}
