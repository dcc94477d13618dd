//! Markup-heuristic strategy: last-resort scraping of listing cards.

use scraper::{ElementRef, Selector};
use url::Url;

use super::ExtractionStrategy;
use crate::error::Result;
use crate::models::{ExtractionMethod, ListingSelectors, PageSnapshot, RawListing};
use crate::utils::{digits_only, normalize_whitespace, parse_selectors, resolve_url};

pub struct MarkupStrategy {
    card: Vec<Selector>,
    title: Vec<Selector>,
    link: Vec<Selector>,
    price: Vec<Selector>,
    info: Vec<Selector>,
    attr_name: String,
    info_separator: String,
}

impl MarkupStrategy {
    pub fn new(selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            card: parse_selectors(&selectors.card)?,
            title: parse_selectors(&selectors.title)?,
            link: parse_selectors(&selectors.link)?,
            price: parse_selectors(&selectors.price)?,
            info: parse_selectors(&selectors.info)?,
            attr_name: selectors.attr_name.clone(),
            info_separator: selectors.info_separator.clone(),
        })
    }

    fn parse_card(&self, card: &ElementRef, base_url: Option<&Url>) -> Option<RawListing> {
        let title = first_text(card, &self.title)?;

        let href = self
            .link
            .iter()
            .find_map(|sel| card.select(sel).find_map(|a| a.value().attr(&self.attr_name)));
        let url = href.map(|href| match base_url {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        });

        let price = first_text(card, &self.price).and_then(|text| digits_only(&text));

        let info = first_text(card, &self.info).unwrap_or_default();
        let mut parts = info.split(self.info_separator.as_str()).map(str::trim);
        let mileage = parts.next().and_then(digits_only);
        let location = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

        let mut raw = RawListing::new().with("title", title).with("currency", "USD");
        raw.set("url", url);
        raw.set("price", price);
        raw.set("mileage", mileage);
        raw.set("location", location);
        Some(raw)
    }
}

/// Text of the first element matched by any of `selectors`, whitespace-collapsed.
fn first_text(scope: &ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        scope
            .select(sel)
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .find(|text| !text.is_empty())
    })
}

impl ExtractionStrategy for MarkupStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Markup
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Result<Vec<RawListing>> {
        let document = snapshot.document();
        let base_url = Url::parse(snapshot.url()).ok();

        // The first card selector that matches anything wins.
        let listings = self
            .card
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|cards| !cards.is_empty())
            .unwrap_or_default()
            .iter()
            .filter_map(|card| self.parse_card(card, base_url.as_ref()))
            .collect();
        Ok(listings)
    }
}
