// src/models/selectors.rs

//! CSS selectors for scraping listing cards.
//!
//! Every field is a list of alternatives tried in order, so a markup redesign
//! only needs a new entry rather than a code change.

use serde::{Deserialize, Serialize};

/// CSS selectors for scraping listing cards out of search-result markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selectors for each listing card
    #[serde(default = "defaults::card")]
    pub card: Vec<String>,

    /// Selectors for the title element within a card
    #[serde(default = "defaults::title")]
    pub title: Vec<String>,

    /// Selectors for the detail link within a card
    #[serde(default = "defaults::link")]
    pub link: Vec<String>,

    /// Selectors for the price element within a card
    #[serde(default = "defaults::price")]
    pub price: Vec<String>,

    /// Selectors for the combined "mileage | location" element
    #[serde(default = "defaults::info")]
    pub info: Vec<String>,

    /// HTML attribute name for extracting links (usually "href")
    #[serde(default = "defaults::attr_name")]
    pub attr_name: String,

    /// Separator between mileage and location in the info element
    #[serde(default = "defaults::info_separator")]
    pub info_separator: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            card: defaults::card(),
            title: defaults::title(),
            link: defaults::link(),
            price: defaults::price(),
            info: defaults::info(),
            attr_name: defaults::attr_name(),
            info_separator: defaults::info_separator(),
        }
    }
}

impl ListingSelectors {
    /// All selector strings, for validation.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.card
            .iter()
            .chain(&self.title)
            .chain(&self.link)
            .chain(&self.price)
            .chain(&self.info)
    }
}

mod defaults {
    pub fn card() -> Vec<String> {
        vec![
            ".srp-grid-list-item".into(),
            "div[id^='listing_']".into(),
            "article.srp-list-item".into(),
        ]
    }
    pub fn title() -> Vec<String> {
        vec!["h3.srp-list-item-basic-info-model".into(), "h3".into(), "h2".into()]
    }
    pub fn link() -> Vec<String> {
        vec![
            ".srp-list-item__header a".into(),
            "header a".into(),
            "a[href*='/vehicle/']".into(),
        ]
    }
    pub fn price() -> Vec<String> {
        vec![".srp-list-item__price".into(), "[class*='price']".into()]
    }
    pub fn info() -> Vec<String> {
        vec![
            "span.srp-grid-list-item__mileage-address".into(),
            "[class*='mileage']".into(),
        ]
    }
    pub fn attr_name() -> String {
        "href".into()
    }
    pub fn info_separator() -> String {
        "|".into()
    }
}
