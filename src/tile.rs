use crate::footprint::Footprint;
use crate::math::{angle_of, normalize_angle, Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;
use itertools::Itertools;
use smallvec::SmallVec;
use std::f64::consts::TAU;

/// Unique ID of a [Tile], assigned in construction order.
pub type TileId = usize;

/// The coarsest permitted footprint sample spacing, in m.
const MAX_SAMPLE_SPACING: f64 = 1.0;

/// One spatial cell of the intersection's discretized surface.
#[derive(Clone, Debug)]
pub struct Tile {
    /// The tile ID.
    id: TileId,
    /// The region of road the tile covers.
    footprint: TileFootprint,
    /// The angular span of the tile around the intersection centre.
    /// Only used during construction.
    span: Interval<f64>,
}

#[derive(Clone, Debug)]
enum TileFootprint {
    /// An annular sector of the central ring.
    Sector {
        radii: Interval<f64>,
        angles: Interval<f64>,
    },
    /// A rectangular extension cell over an entry or exit zone.
    Rect(Footprint),
}

impl Tile {
    /// Gets the tile's ID.
    pub fn id(&self) -> TileId {
        self.id
    }

    /// The angular span of the tile around the intersection centre.
    pub fn angular_span(&self) -> Interval<f64> {
        self.span
    }
}

/// The entry and exit poses of one approach road,
/// used to place the extension tiles covering its entry and exit zones.
#[derive(Clone, Copy, Debug)]
pub struct Approach {
    /// Where the entry lane crosses the outer rim.
    pub entry_point: Point2d,
    /// The direction of travel at the entry point.
    pub entry_heading: Vector2d,
    /// Where the exit lane crosses the outer rim.
    pub exit_point: Point2d,
    /// The direction of travel at the exit point.
    pub exit_heading: Vector2d,
    /// The lane width in m.
    pub width: f64,
}

/// Subdivides a roundabout intersection into a fixed set of space cells:
/// angularly-equal sectors of the ring, plus extension cells over each
/// approach's entry and exit zones. Immutable once built.
pub struct TiledArea {
    /// The centre of the intersection.
    centre: Point2d,
    /// The radial extent of the ring.
    radii: Interval<f64>,
    /// The number of angularly-equal ring tiles.
    granularity: usize,
    /// The angle subtended by one ring tile.
    sector_angle: f64,
    /// All tiles, indexed by ID. Ring tiles first, then extension tiles.
    tiles: Vec<Tile>,
    /// Footprint sample spacing for the overlap query.
    sample_spacing: f64,
}

impl TiledArea {
    /// Builds the tile set for an intersection.
    ///
    /// # Parameters
    /// * `centre` - The centre of the intersection.
    /// * `minimal_radius` - The inner radius of the ring in m.
    /// * `maximal_radius` - The outer radius of the ring in m.
    /// * `central_radius` - The radius of the central island, if any.
    /// * `granularity` - The number of angularly-equal ring tiles.
    /// * `approaches` - The entry/exit poses of each approach road.
    pub fn build(
        centre: Point2d,
        minimal_radius: f64,
        maximal_radius: f64,
        central_radius: Option<f64>,
        granularity: usize,
        approaches: &[Approach],
    ) -> Self {
        if granularity == 0 {
            panic!("tiled area granularity must be non-zero");
        }
        if minimal_radius <= 0.0 || maximal_radius <= minimal_radius {
            panic!("tiled area radii are degenerate");
        }
        if let Some(central) = central_radius {
            if central > minimal_radius {
                panic!("central island protrudes into the ring");
            }
        }

        let radii = Interval::new(minimal_radius, maximal_radius);
        let sector_angle = TAU / granularity as f64;
        let depth = radii.length();

        let sectors = (0..granularity).map(|i| {
            let angles = Interval::new(i as f64 * sector_angle, (i + 1) as f64 * sector_angle);
            (TileFootprint::Sector { radii, angles }, angles)
        });

        let extensions = approaches
            .iter()
            .flat_map(|approach| {
                let entry = Footprint::new(
                    approach.entry_point - (0.5 * depth) * approach.entry_heading,
                    approach.entry_heading,
                    depth,
                    approach.width,
                );
                let exit = Footprint::new(
                    approach.exit_point + (0.5 * depth) * approach.exit_heading,
                    approach.exit_heading,
                    depth,
                    approach.width,
                );
                [entry, exit]
            })
            .map(|rect| {
                let radial = rect.centre() - centre;
                let angle = normalize_angle(angle_of(radial));
                let half_span = f64::atan2(0.5 * depth, radial.magnitude());
                (TileFootprint::Rect(rect), Interval::disc(angle, half_span))
            });

        let tiles = sectors
            .chain(extensions)
            .enumerate()
            .map(|(id, (footprint, span))| Tile {
                id,
                footprint,
                span,
            })
            .collect_vec();

        // Sample finely enough that no tile can slip between two samples
        let min_arc = minimal_radius * sector_angle;
        let sample_spacing = f64::min(0.5 * f64::min(depth, min_arc), MAX_SAMPLE_SPACING);

        Self {
            centre,
            radii,
            granularity,
            sector_angle,
            tiles,
            sample_spacing,
        }
    }

    /// The number of tiles.
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// The radial extent of the ring.
    pub fn radial_span(&self) -> Interval<f64> {
        self.radii
    }

    /// Gets the tile with the given ID.
    pub fn get_tile(&self, id: TileId) -> &Tile {
        &self.tiles[id]
    }

    /// Returns an iterator over all the tiles.
    pub fn iter_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Returns every tile whose region intersects the given footprint,
    /// in ascending ID order. A pure function of the static tile geometry
    /// and the footprint.
    pub fn tiles_overlapping(&self, footprint: &Footprint) -> SmallVec<[TileId; 16]> {
        let mut out: SmallVec<[TileId; 16]> = SmallVec::new();

        // Ring tiles, by binning footprint samples in polar space
        for point in footprint.samples(self.sample_spacing) {
            let radial = point - self.centre;
            let angle = normalize_angle(angle_of(radial));
            let idx = usize::min((angle / self.sector_angle) as usize, self.granularity - 1);
            if let TileFootprint::Sector { radii, angles } = &self.tiles[idx].footprint {
                if radii.contains(radial.magnitude())
                    && angles.contains(angle)
                    && !out.contains(&idx)
                {
                    out.push(idx);
                }
            }
        }

        // Extension tiles, by rectangle intersection
        for tile in &self.tiles[self.granularity..] {
            if let TileFootprint::Rect(rect) = &tile.footprint {
                if rect.overlaps(footprint) {
                    out.push(tile.id);
                }
            }
        }

        out.sort_unstable();
        out
    }

    /// Returns true if the footprint touches any part of the tiled area.
    pub fn covers(&self, footprint: &Footprint) -> bool {
        !self.tiles_overlapping(footprint).is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::unit_vector;

    fn area() -> TiledArea {
        let approaches = [0.0f64, std::f64::consts::FRAC_PI_2].map(|angle| {
            let u = unit_vector(angle);
            Approach {
                entry_point: Point2d::new(0.0, 0.0) + 16.0 * u,
                entry_heading: -u,
                exit_point: Point2d::new(0.0, 0.0) + 16.0 * u,
                exit_heading: u,
                width: 4.0,
            }
        });
        TiledArea::build(Point2d::new(0.0, 0.0), 8.0, 16.0, Some(6.0), 24, &approaches)
    }

    #[test]
    fn construction_is_stable() {
        let area = area();
        assert_eq!(area.num_tiles(), 24 + 4);
        for (idx, tile) in area.iter_tiles().enumerate() {
            assert_eq!(tile.id(), idx);
        }
    }

    #[test]
    #[should_panic]
    fn zero_granularity_is_an_error() {
        TiledArea::build(Point2d::new(0.0, 0.0), 8.0, 16.0, None, 0, &[]);
    }

    #[test]
    #[should_panic]
    fn inverted_radii_are_an_error() {
        TiledArea::build(Point2d::new(0.0, 0.0), 16.0, 8.0, None, 24, &[]);
    }

    #[test]
    fn footprint_in_a_sector_finds_that_sector() {
        let area = area();
        let sector_angle = TAU / 24.0;
        // Centre of sector 6, radially aligned
        let angle = 6.5 * sector_angle;
        let fp = Footprint::new(
            Point2d::new(0.0, 0.0) + 12.0 * unit_vector(angle),
            unit_vector(angle + std::f64::consts::FRAC_PI_2),
            2.0,
            2.0,
        );
        let tiles = area.tiles_overlapping(&fp);
        assert!(tiles.contains(&6));
        assert!(tiles.iter().all(|id| *id < 24));
    }

    #[test]
    fn footprint_outside_the_area_finds_nothing() {
        let area = area();
        let fp = Footprint::new(Point2d::new(40.0, 40.0), Vector2d::new(1.0, 0.0), 5.0, 2.0);
        assert!(area.tiles_overlapping(&fp).is_empty());
        assert!(!area.covers(&fp));
    }

    #[test]
    fn footprint_on_an_entry_zone_finds_the_extension_tile() {
        let area = area();
        // Just outside the rim on the +x approach
        let fp = Footprint::new(Point2d::new(18.0, 0.0), Vector2d::new(-1.0, 0.0), 5.0, 2.0);
        let tiles = area.tiles_overlapping(&fp);
        assert!(tiles.iter().any(|id| *id >= 24));
    }

    #[test]
    fn overlap_query_is_deterministic() {
        let area = area();
        let fp = Footprint::new(Point2d::new(11.0, 3.0), Vector2d::new(0.0, 1.0), 5.0, 2.0);
        let a = area.tiles_overlapping(&fp);
        let b = area.tiles_overlapping(&fp);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
