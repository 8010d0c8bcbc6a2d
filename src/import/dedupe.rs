use rusqlite::Connection;

use crate::error::Result;
use crate::models::{DimensionIds, Listing, ListingArgs};
use crate::repository::listings;

/// What the importer should do with an incoming row, decided by its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    New,
    DuplicateUnchanged { listing_id: i64 },
    DuplicateUpdate { listing_id: i64 },
}

pub fn check(conn: &Connection, incoming: &ListingArgs, dims: &DimensionIds) -> Result<GateDecision> {
    let decision = match listings::find_by_url(conn, &incoming.url)? {
        None => GateDecision::New,
        Some(existing) if listing_has_changes(&existing, incoming, dims) => GateDecision::DuplicateUpdate {
            listing_id: existing.listing_id,
        },
        Some(existing) => GateDecision::DuplicateUnchanged {
            listing_id: existing.listing_id,
        },
    };
    Ok(decision)
}

/// Compares every stored field and dimension reference against the incoming row.
pub fn listing_has_changes(existing: &Listing, incoming: &ListingArgs, dims: &DimensionIds) -> bool {
    existing.dimension_ids() != *dims
        || existing.rooms != incoming.rooms
        || existing.area != incoming.area
        || existing.price_total_zl != incoming.price_total_zl
        || existing.price_sqm_zl != incoming.price_sqm_zl
        || existing.price_per_sqm_detailed != incoming.price_per_sqm_detailed
        || existing.date_posted != incoming.date_posted
        || existing.photo_count != incoming.photo_count
        || existing.image_url != incoming.image_url
        || existing.description_text != incoming.description_text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn dims() -> DimensionIds {
        DimensionIds {
            location_id: 1,
            building_id: 1,
            owner_id: 1,
            features_id: 1,
        }
    }

    fn incoming() -> ListingArgs {
        ListingArgs {
            url: "http://x/1".to_string(),
            rooms: Some(2),
            area: Some(Decimal::new(655, 1)),
            price_total_zl: Some(Decimal::from(300_000)),
            date_posted: NaiveDate::from_ymd_opt(2024, 1, 15),
            description_text: Some("Bright flat".to_string()),
            ..Default::default()
        }
    }

    fn stored(args: &ListingArgs) -> Listing {
        let ids = dims();
        Listing {
            listing_id: 7,
            location_id: ids.location_id,
            building_id: ids.building_id,
            owner_id: ids.owner_id,
            features_id: ids.features_id,
            rooms: args.rooms,
            area: args.area,
            price_total_zl: args.price_total_zl,
            price_sqm_zl: args.price_sqm_zl,
            price_per_sqm_detailed: args.price_per_sqm_detailed,
            date_posted: args.date_posted,
            photo_count: args.photo_count,
            url: args.url.clone(),
            image_url: args.image_url.clone(),
            description_text: args.description_text.clone(),
        }
    }

    #[test]
    fn test_no_changes() {
        let args = incoming();
        assert!(!listing_has_changes(&stored(&args), &args, &dims()));
    }

    #[test]
    fn test_price_change_detected() {
        let existing = stored(&incoming());
        let mut updated = incoming();
        updated.price_total_zl = Some(Decimal::from(310_000));
        assert!(listing_has_changes(&existing, &updated, &dims()));
    }

    #[test]
    fn test_field_cleared_is_a_change() {
        let existing = stored(&incoming());
        let mut updated = incoming();
        updated.description_text = None;
        assert!(listing_has_changes(&existing, &updated, &dims()));
    }

    #[test]
    fn test_dimension_reference_change_detected() {
        let args = incoming();
        let moved = DimensionIds {
            location_id: 2,
            ..dims()
        };
        assert!(listing_has_changes(&stored(&args), &args, &moved));
    }

    #[test]
    fn test_decimal_scale_is_not_a_change() {
        let existing = stored(&incoming());
        let mut same = incoming();
        same.price_total_zl = Some(Decimal::new(30_000_000, 2));
        assert!(!listing_has_changes(&existing, &same, &dims()));
    }
}
