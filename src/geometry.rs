//! Geometric utility objects for geographic and index space.

use crate::num::PFloat;
use std::{
    fmt,
    ops::{Add, Index, IndexMut, Mul, Sub},
};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Denotes the zonal (longitude), meridional (latitude) or vertical
/// (depth) dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dim3 {
    X = 0,
    Y = 1,
    Z = 2,
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::X => "lon",
                Self::Y => "lat",
                Self::Z => "depth",
            }
        )
    }
}

use Dim3::{X, Y, Z};

/// Represents any quantity with three dimensional components.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct In3D<T>([T; 3]);

impl<T> In3D<T> {
    /// Creates a new 3D quantity given the three components.
    pub fn new(x: T, y: T, z: T) -> Self {
        Self([x, y, z])
    }

    /// Creates a new 3D quantity with the given value copied into all components.
    pub fn same(a: T) -> Self
    where
        T: Copy,
    {
        Self([a, a, a])
    }
}

impl<T> Index<Dim3> for In3D<T> {
    type Output = T;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim as usize]
    }
}

/// A geographic position: longitude and latitude in degrees and depth
/// in meters (negative below the surface).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct Point3<F>([F; 3]);

impl<F: PFloat> Point3<F> {
    /// Creates a new position given the three coordinates.
    pub fn new(lon: F, lat: F, depth: F) -> Self {
        Self([lon, lat, depth])
    }
}

impl<F: PFloat> Index<Dim3> for Point3<F> {
    type Output = F;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim as usize]
    }
}

impl<F: PFloat> IndexMut<Dim3> for Point3<F> {
    fn index_mut(&mut self, dim: Dim3) -> &mut Self::Output {
        &mut self.0[dim as usize]
    }
}

impl<F: PFloat> fmt::Display for Point3<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self[X], self[Y], self[Z])
    }
}

/// A 3D vector quantity, such as a velocity or a coordinate displacement.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct Vec3<F>([F; 3]);

impl<F: PFloat> Vec3<F> {
    /// Creates a new vector given the three components.
    pub fn new(x: F, y: F, z: F) -> Self {
        Self([x, y, z])
    }

    /// Creates a new zero vector.
    pub fn zero() -> Self {
        Self([F::zero(), F::zero(), F::zero()])
    }
}

impl<F: PFloat> Index<Dim3> for Vec3<F> {
    type Output = F;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim as usize]
    }
}

impl<F: PFloat> IndexMut<Dim3> for Vec3<F> {
    fn index_mut(&mut self, dim: Dim3) -> &mut Self::Output {
        &mut self.0[dim as usize]
    }
}

impl<F: PFloat> Add<&Vec3<F>> for &Vec3<F> {
    type Output = Vec3<F>;
    fn add(self, other: &Vec3<F>) -> Vec3<F> {
        Vec3::new(self[X] + other[X], self[Y] + other[Y], self[Z] + other[Z])
    }
}

impl<F: PFloat> Add<Vec3<F>> for Vec3<F> {
    type Output = Vec3<F>;
    fn add(self, other: Vec3<F>) -> Vec3<F> {
        &self + &other
    }
}

impl<F: PFloat> Sub<&Vec3<F>> for &Vec3<F> {
    type Output = Vec3<F>;
    fn sub(self, other: &Vec3<F>) -> Vec3<F> {
        Vec3::new(self[X] - other[X], self[Y] - other[Y], self[Z] - other[Z])
    }
}

impl<F: PFloat> Mul<F> for &Vec3<F> {
    type Output = Vec3<F>;
    fn mul(self, factor: F) -> Vec3<F> {
        Vec3::new(self[X] * factor, self[Y] * factor, self[Z] * factor)
    }
}

impl<F: PFloat> Mul<F> for Vec3<F> {
    type Output = Vec3<F>;
    fn mul(self, factor: F) -> Vec3<F> {
        &self * factor
    }
}

impl<F: PFloat> Add<&Vec3<F>> for &Point3<F> {
    type Output = Point3<F>;
    fn add(self, displacement: &Vec3<F>) -> Point3<F> {
        Point3::new(
            self[X] + displacement[X],
            self[Y] + displacement[Y],
            self[Z] + displacement[Z],
        )
    }
}

impl<F: PFloat> Add<Vec3<F>> for &Point3<F> {
    type Output = Point3<F>;
    fn add(self, displacement: Vec3<F>) -> Point3<F> {
        self + &displacement
    }
}

impl<F: PFloat> Sub<&Point3<F>> for &Point3<F> {
    type Output = Vec3<F>;
    fn sub(self, other: &Point3<F>) -> Vec3<F> {
        Vec3::new(self[X] - other[X], self[Y] - other[Y], self[Z] - other[Z])
    }
}

/// A fractional grid index: the integer part names the enclosing grid
/// cell and the fractional part the offset within it, for each axis.
///
/// Computed on demand from a geographic position and never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct FracIdx3<F>(In3D<F>);

impl<F: PFloat> FracIdx3<F> {
    /// Creates a new fractional index given the three axis components.
    pub fn new(i: F, j: F, k: F) -> Self {
        Self(In3D::new(i, j, k))
    }

    /// Splits the component for the given dimension into the enclosing
    /// cell index and the offset within the cell.
    pub fn cell_and_offset(&self, dim: Dim3) -> (isize, F) {
        let raw = self.0[dim];
        let cell = raw.floor();
        (
            cell.to_isize().unwrap_or(isize::MAX),
            raw - cell,
        )
    }
}

impl<F: PFloat> Index<Dim3> for FracIdx3<F> {
    type Output = F;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim]
    }
}
