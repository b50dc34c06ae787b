/*!
 * Geographic calculations.
 *
 * Positions come in as geographic coordinates (degrees) but every containment and distance test
 * is done in a projected, metric coordinate system. The [Projection] trait is the seam between
 * the two; [Corridor] is a reference line buffered by a margin in that projected system.
 */
use geo::{EuclideanDistance, HaversineDistance, LineString, Point};

mod transverse_mercator;
pub use transverse_mercator::TransverseMercator;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Coord { lon, lat }
    }
}

/// Map geographic coordinates onto a plane where distances are in meters.
pub trait Projection {
    /// Geographic to projected, the returned point is (easting, northing) in meters.
    fn project(&self, coord: Coord) -> Point<f64>;

    /// Projected back to geographic.
    fn unproject(&self, pnt: Point<f64>) -> Coord;
}

/**
 * A reference line and the region within `margin` meters of it.
 *
 * The region is the exact buffer of the projected line: round caps at the ends and round joins at
 * the interior waypoints. It is closed, so a point exactly `margin` meters away is inside.
 */
#[derive(Debug, Clone)]
pub struct Corridor {
    line: LineString<f64>,
    margin: f64,
}

impl Corridor {
    /// Project `waypoints` and buffer the resulting line by `margin` meters.
    pub fn new<P: Projection + ?Sized>(projection: &P, waypoints: &[Coord], margin: f64) -> Self {
        let line: LineString<f64> = waypoints
            .iter()
            .map(|&wp| projection.project(wp))
            .collect();

        Corridor { line, margin }
    }

    /// The buffer width in meters.
    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Distance in meters from a projected point to the reference line itself.
    pub fn distance_to_line(&self, pnt: &Point<f64>) -> f64 {
        pnt.euclidean_distance(&self.line)
    }

    pub fn contains(&self, pnt: &Point<f64>) -> bool {
        self.distance_to_line(pnt) <= self.margin
    }

    /// Distance in meters from a projected point to the edge of the corridor, zero if inside.
    pub fn distance_outside(&self, pnt: &Point<f64>) -> f64 {
        (self.distance_to_line(pnt) - self.margin).max(0.0)
    }
}

/// Great circle distance between two coordinates in kilometers.
pub fn great_circle_distance(from: Coord, to: Coord) -> f64 {
    let from = Point::new(from.lon, from.lat);
    let to = Point::new(to.lon, to.lat);

    from.haversine_distance(&to) / 1000.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_corridor_contains_and_distance() {
        let proj = TransverseMercator::SWEREF99_TM;
        let waypoints = [Coord::new(15.0, 58.0), Coord::new(15.0, 58.5)];
        let corridor = Corridor::new(&proj, &waypoints, 1500.0);

        let start = proj.project(waypoints[0]);
        let end = proj.project(waypoints[1]);
        let mid = Point::new((start.x() + end.x()) / 2.0, (start.y() + end.y()) / 2.0);

        // The line runs along the central meridian, so it is vertical in the projected plane.
        assert!((start.x() - end.x()).abs() < 1.0e-6);

        assert!(corridor.contains(&mid));
        assert!(corridor.contains(&Point::new(mid.x() + 1499.0, mid.y())));
        assert!(corridor.contains(&Point::new(mid.x() - 1500.0, mid.y())));
        assert!(!corridor.contains(&Point::new(mid.x() + 1501.0, mid.y())));

        let outside = Point::new(mid.x() - 3000.0, mid.y());
        assert!((corridor.distance_to_line(&outside) - 3000.0).abs() < 1.0e-6);
        assert!((corridor.distance_outside(&outside) - 1500.0).abs() < 1.0e-6);
        assert_eq!(corridor.distance_outside(&mid), 0.0);

        // Round cap beyond the end of the line.
        let beyond = Point::new(end.x(), end.y() + 2000.0);
        assert!((corridor.distance_outside(&beyond) - 500.0).abs() < 1.0e-6);
    }

    #[test]
    fn test_waypoint_order_does_not_matter() {
        let proj = TransverseMercator::SWEREF99_TM;
        let forward = [Coord::new(10.0, 58.0), Coord::new(10.5, 58.2)];
        let backward = [forward[1], forward[0]];

        let c1 = Corridor::new(&proj, &forward, 1500.0);
        let c2 = Corridor::new(&proj, &backward, 1500.0);

        let pnt = proj.project(Coord::new(10.3, 58.15));
        assert!((c1.distance_outside(&pnt) - c2.distance_outside(&pnt)).abs() < 1.0e-9);
        assert_eq!(c1.contains(&pnt), c2.contains(&pnt));
    }

    #[test]
    fn test_great_circle_distance() {
        // One degree of latitude is roughly 111 km.
        let dist = great_circle_distance(Coord::new(11.0, 58.0), Coord::new(11.0, 59.0));
        assert!((dist - 111.19).abs() < 0.1);
        assert_eq!(
            great_circle_distance(Coord::new(11.0, 58.0), Coord::new(11.0, 58.0)),
            0.0
        );

        // Along a parallel the distance shrinks with the cosine of the latitude.
        let dist = great_circle_distance(Coord::new(10.0, 60.0), Coord::new(11.0, 60.0));
        assert!((dist - 55.6).abs() < 0.1);
    }
}
