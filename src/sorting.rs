use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::models::ListingWithLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortType {
    Price,
    PricePerSqm,
    DatePosted,
    Area,
    /// "Most relevant": keeps the incoming order.
    BestMatch,
}

impl SortType {
    /// Unknown names yield `None`, which leaves results unsorted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "price" => Some(SortType::Price),
            "price_per_sqm" => Some(SortType::PricePerSqm),
            "date_posted" => Some(SortType::DatePosted),
            "area" => Some(SortType::Area),
            "najtrafniejsze" => Some(SortType::BestMatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// `desc` in any letter case is descending; anything else, or nothing, is ascending.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(order) if order.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Amount(Decimal),
    Date(NaiveDate),
}

pub struct OfferSorter;

impl OfferSorter {
    /// Returns a sorted copy of `offers`. The sort is stable; missing values
    /// go last ascending and first descending.
    pub fn sort(
        offers: &[ListingWithLocation],
        sort_by: Option<SortType>,
        order: SortOrder,
    ) -> Vec<ListingWithLocation> {
        let mut sorted = offers.to_vec();
        let key_fn: fn(&ListingWithLocation) -> Option<SortKey> = match sort_by {
            Some(SortType::Price) => |o: &ListingWithLocation| o.price_total_zl.map(SortKey::Amount),
            Some(SortType::PricePerSqm) => |o: &ListingWithLocation| price_per_sqm(o).map(SortKey::Amount),
            Some(SortType::DatePosted) => |o: &ListingWithLocation| o.date_posted.map(SortKey::Date),
            Some(SortType::Area) => |o: &ListingWithLocation| o.area.map(SortKey::Amount),
            Some(SortType::BestMatch) | None => return sorted,
        };

        sorted.sort_by(|a, b| {
            let ordering = compare_keys(key_fn(a), key_fn(b));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        sorted
    }
}

/// Detailed price per m², else the listed one, else total / area.
pub fn price_per_sqm(offer: &ListingWithLocation) -> Option<Decimal> {
    offer
        .price_per_sqm_detailed
        .or(offer.price_sqm_zl)
        .or_else(|| match (offer.price_total_zl, offer.area) {
            (Some(total), Some(area)) if !area.is_zero() => total.checked_div(area),
            _ => None,
        })
}

/// Present values order before missing ones.
fn compare_keys(a: Option<SortKey>, b: Option<SortKey>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
