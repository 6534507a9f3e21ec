//! Point types and related functionality

use nalgebra::{Point3, Vector3};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// Midpoint of two points.
///
/// Computed as `(a + b) / 2` on the coordinates, which is symmetric in its
/// arguments.
#[inline]
pub fn midpoint(a: &Point3f, b: &Point3f) -> Point3f {
    Point3f::from((a.coords + b.coords) / 2.0)
}

/// Unweighted centroid of a set of points, `None` for an empty set.
pub fn centroid<'a, I>(points: I) -> Option<Point3f>
where
    I: IntoIterator<Item = &'a Point3f>,
{
    let mut sum = Vector3f::zeros();
    let mut count = 0usize;
    for p in points {
        sum += p.coords;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(Point3f::from(sum / count as f32))
}
