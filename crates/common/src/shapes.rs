// Copyright (C) 2023 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::io::{self, Read, Write};

use glam::Vec3;

use crate::traits::{BinaryDeserialization, BinarySerialization};

/// Axis-aligned bounding box, stored as center/extent rather than min/max so
/// growing it by union is a couple of component-wise ops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub extent: Vec3,
}

impl Aabb {
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            extent: (max - min) * 0.5,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.extent
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.extent
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }
}

impl BinarySerialization for Aabb {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.center.serialize(w)?;
        self.extent.serialize(w)
    }
}

impl BinaryDeserialization for Aabb {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(Aabb {
            center: Vec3::deserialize(r)?,
            extent: Vec3::deserialize(r)?,
        })
    }
}

/// Bounding sphere produced by the two-pass Ritter heuristic during mesh
/// bounds computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Smallest sphere that contains both inputs. Used when combining the
    /// per-submesh spheres into one mesh-wide bound.
    pub fn union(&self, other: &Sphere) -> Sphere {
        let between = other.center - self.center;
        let distance = between.length();

        if distance + other.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= other.radius {
            return other.clone();
        }

        let radius = (self.radius + other.radius + distance) * 0.5;
        let direction = if distance > f32::EPSILON {
            between / distance
        } else {
            Vec3::X
        };
        let center = self.center + direction * (radius - self.radius);
        Sphere { center, radius }
    }

    /// Ritter's approximate bounding-sphere algorithm: find an extreme point,
    /// find the point farthest from it, seed a sphere on that diameter, then
    /// grow it to cover every remaining point.
    pub fn ritter_bound(points: &[Vec3]) -> Sphere {
        assert!(!points.is_empty(), "cannot bound an empty point set");

        let mut min = points[0];
        for &p in points {
            if p.x < min.x {
                min = p;
            }
        }

        let farthest_from_min = points
            .iter()
            .copied()
            .max_by(|a, b| {
                (*a - min)
                    .length_squared()
                    .total_cmp(&(*b - min).length_squared())
            })
            .unwrap();

        let farthest_from_that = points
            .iter()
            .copied()
            .max_by(|a, b| {
                (*a - farthest_from_min)
                    .length_squared()
                    .total_cmp(&(*b - farthest_from_min).length_squared())
            })
            .unwrap();

        let center = (farthest_from_min + farthest_from_that) * 0.5;
        let mut radius = (farthest_from_min - center).length();

        for &p in points {
            let dist = (p - center).length();
            if dist > radius {
                radius = dist;
            }
        }

        Sphere { center, radius }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn aabb_union_covers_both() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(0.5));
        let union = a.union(&b);
        assert_eq!(union.min(), Vec3::splat(-1.0));
        assert_eq!(union.max(), Vec3::ONE);
    }

    #[test]
    fn ritter_bound_contains_all_points() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(-3.0, -3.0, 3.0),
        ];
        let sphere = Sphere::ritter_bound(&points);
        for p in points {
            assert!((p - sphere.center).length() <= sphere.radius + 1e-4);
        }
    }

    #[test]
    fn sphere_union_contains_both() {
        let a = Sphere::new(Vec3::ZERO, 1.0);
        let b = Sphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0);
        let union = a.union(&b);
        assert!((a.center - union.center).length() + a.radius <= union.radius + 1e-4);
        assert!((b.center - union.center).length() + b.radius <= union.radius + 1e-4);
    }
}
