//! # Geofence Membership Engine
//!
//! Computes which assets sit inside which areas. The cost is
//! `O(areas x assets x boundary_len)`; both collections are small per
//! deployment so there is no spatial index and no cached state here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::Asset;
use crate::location::{Area, Location};

impl Area {
    /// Assets whose last position falls inside this area.
    ///
    /// Assets at the `(0, 0)` sentinel, or with an out-of-range position, are
    /// never members.
    pub fn assets_in_area<'a>(&self, assets: &'a [Asset]) -> Vec<&'a Asset> {
        assets
            .iter()
            .filter(|asset| {
                asset
                    .position
                    .coordinate()
                    .is_some_and(|point| self.contains(&point))
            })
            .collect()
    }
}

impl Location {
    /// Membership over this location's active areas.
    #[must_use]
    pub fn membership(&self, assets: &[Asset]) -> Membership {
        Membership::compute(self.active_areas(), assets)
    }
}

/// Direction of a membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTransition {
    Entered,
    Exited,
}

/// One asset entering or leaving one area
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MembershipChange {
    pub area_id: Uuid,
    pub asset_id: Uuid,
    pub transition: MembershipTransition,
}

/// Asset/area membership relation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// asset -> areas containing it (assets inside no area are absent)
    pub by_asset: BTreeMap<Uuid, BTreeSet<Uuid>>,
    /// area -> assets inside it (every evaluated area is present)
    pub by_area: BTreeMap<Uuid, BTreeSet<Uuid>>,
}

impl Membership {
    pub fn compute<'a>(areas: impl IntoIterator<Item = &'a Area>, assets: &[Asset]) -> Self {
        let mut membership = Self::default();

        for area in areas {
            let members: BTreeSet<Uuid> =
                area.assets_in_area(assets).iter().map(|a| a.id).collect();
            for asset_id in &members {
                membership
                    .by_asset
                    .entry(*asset_id)
                    .or_default()
                    .insert(area.id);
            }
            membership.by_area.insert(area.id, members);
        }

        membership
    }

    /// Areas containing the asset (empty when it is in none).
    pub fn areas_of(&self, asset_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.by_asset.get(&asset_id).into_iter().flatten().copied()
    }

    /// Assets inside the area (empty for unknown areas).
    pub fn members_of(&self, area_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.by_area.get(&area_id).into_iter().flatten().copied()
    }

    #[must_use]
    pub fn contains(&self, area_id: Uuid, asset_id: Uuid) -> bool {
        self.by_area
            .get(&area_id)
            .is_some_and(|members| members.contains(&asset_id))
    }

    fn pairs(&self) -> BTreeSet<(Uuid, Uuid)> {
        self.by_area
            .iter()
            .flat_map(|(area, assets)| assets.iter().map(move |asset| (*area, *asset)))
            .collect()
    }

    /// Changes needed to go from `previous` to `self`, exits first, each group
    /// ordered by (area, asset).
    #[must_use]
    pub fn diff(&self, previous: &Self) -> Vec<MembershipChange> {
        let before = previous.pairs();
        let after = self.pairs();

        let exited = before.difference(&after).map(|&(area_id, asset_id)| MembershipChange {
            area_id,
            asset_id,
            transition: MembershipTransition::Exited,
        });
        let entered = after.difference(&before).map(|&(area_id, asset_id)| MembershipChange {
            area_id,
            asset_id,
            transition: MembershipTransition::Entered,
        });

        exited.chain(entered).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Position;
    use crate::geometry::Coordinate;
    use crate::location::NewArea;
    use fake::Fake;
    use fake::faker::name::en::Name;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn square(lat0: f64, lon0: f64, size: f64) -> Vec<Coordinate> {
        vec![
            c(lat0, lon0),
            c(lat0, lon0 + size),
            c(lat0 + size, lon0 + size),
            c(lat0 + size, lon0),
        ]
    }

    fn asset_at(lat: f64, lon: f64) -> Asset {
        Asset::new(Name().fake::<String>(), "team", Position::new(lat, lon, 0.0))
    }

    fn random_fleet(n: usize) -> Vec<Asset> {
        (0..n)
            .map(|_| asset_at((-5.0..15.0).fake::<f64>(), (-5.0..15.0).fake::<f64>()))
            .collect()
    }

    #[test]
    fn test_assets_in_area() {
        let mut loc = Location::new("FOB", c(5.0, 5.0));
        let area = loc.add_area(NewArea::new("Z", square(0.0, 0.0, 10.0)), None).unwrap().clone();

        let assets = vec![asset_at(5.0, 5.0), asset_at(15.0, 15.0), asset_at(0.0, 5.0)];
        let inside: Vec<_> = area.assets_in_area(&assets).iter().map(|a| a.id).collect();
        assert_eq!(inside, vec![assets[0].id, assets[2].id]);
    }

    #[test]
    fn test_sentinel_asset_never_member() {
        // polygon straddling the origin
        let mut loc = Location::new("Origin", c(0.0, 0.0));
        loc.add_area(NewArea::new("Around origin", square(-1.0, -1.0, 2.0)), None)
            .unwrap();

        let parked = asset_at(0.0, 0.0);
        let membership = loc.membership(std::slice::from_ref(&parked));
        assert_eq!(membership.areas_of(parked.id).count(), 0);
    }

    #[test]
    fn test_random_fleet_members_are_contained() {
        let mut loc = Location::new("FOB", c(5.0, 5.0));
        let a = loc.add_area(NewArea::new("A", square(0.0, 0.0, 6.0)), None).unwrap().id;
        let b = loc.add_area(NewArea::new("B", square(4.0, 4.0, 6.0)), None).unwrap().id;
        let mut fleet = random_fleet(200);
        fleet.push(asset_at(0.0, 0.0));

        let membership = loc.membership(&fleet);

        for asset in &fleet {
            let expected: BTreeSet<Uuid> = loc
                .areas()
                .iter()
                .filter(|area| {
                    asset.position.coordinate().is_some_and(|p| area.contains(&p))
                })
                .map(|area| area.id)
                .collect();
            let actual: BTreeSet<Uuid> = membership.areas_of(asset.id).collect();
            assert_eq!(actual, expected);
        }
        assert!(membership.by_area.contains_key(&a));
        assert!(membership.by_area.contains_key(&b));
    }

    #[test]
    fn test_inactive_area_excluded() {
        let mut loc = Location::new("FOB", c(5.0, 5.0));
        let mut closed = NewArea::new("Closed", square(0.0, 0.0, 10.0));
        closed.active = Some(false);
        let id = loc.add_area(closed, None).unwrap().id;

        let membership = loc.membership(&[asset_at(5.0, 5.0)]);
        assert!(!membership.by_area.contains_key(&id));
    }

    #[test]
    fn test_diff_on_move_and_boundary_change() {
        let mut loc = Location::new("FOB", c(5.0, 5.0));
        let area_id = loc.add_area(NewArea::new("Z", square(0.0, 0.0, 10.0)), None).unwrap().id;
        let mut assets = vec![asset_at(5.0, 5.0), asset_at(20.0, 20.0)];

        let first = loc.membership(&assets);

        // asset 0 leaves, asset 1 arrives
        assets[0].move_to(Position::new(30.0, 30.0, 0.0));
        assets[1].move_to(Position::new(2.0, 2.0, 0.0));
        let second = loc.membership(&assets);

        let changes = second.diff(&first);
        assert_eq!(
            changes,
            vec![
                MembershipChange {
                    area_id,
                    asset_id: assets[0].id,
                    transition: MembershipTransition::Exited,
                },
                MembershipChange {
                    area_id,
                    asset_id: assets[1].id,
                    transition: MembershipTransition::Entered,
                },
            ]
        );

        // shrinking the zone pushes asset 1 out without it moving
        loc.update_area(
            area_id,
            crate::location::AreaUpdate {
                boundary: Some(square(5.0, 5.0, 5.0)),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        let third = loc.membership(&assets);
        let changes = third.diff(&second);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].transition, MembershipTransition::Exited);

        assert!(third.diff(&third).is_empty());
    }
}
