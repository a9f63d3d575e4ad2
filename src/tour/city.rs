//! City coordinates and the device-side city table.

use crate::error::{Result, TspGaError};

/// A 2D coordinate in single precision, laid out as the kernel expects.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "gpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A city: identifier plus coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct City {
    pub id: u32,
    pub point: Point,
}

impl City {
    pub fn new(id: u32, x: f32, y: f32) -> Self {
        Self {
            id,
            point: Point::new(x, y),
        }
    }
}

/// Read-only city table indexed by city id.
///
/// City ids are `1..=n`. Slot 0 holds a copy of city 1 so the kernel can
/// index the table directly with a gene value.
#[derive(Debug, Clone)]
pub struct CityTable {
    points: Vec<Point>,
}

impl CityTable {
    /// Builds the table from cities given in any order.
    ///
    /// # Errors
    /// [`TspGaError::NoCities`] when `cities` is empty,
    /// [`TspGaError::CityIds`] unless the ids are exactly `1..=n` and
    /// [`TspGaError::InvalidCoordinate`] for an infinite or NaN coordinate.
    pub fn new(cities: impl IntoIterator<Item = City>) -> Result<Self> {
        let cities: Vec<City> = cities.into_iter().collect();
        let n = cities.len();
        if n == 0 {
            return Err(TspGaError::NoCities);
        }

        let mut slots: Vec<Option<Point>> = vec![None; n + 1];
        for city in &cities {
            let id = city.id as usize;
            if id == 0 || id > n || slots[id].is_some() {
                return Err(TspGaError::CityIds { expected_max: n });
            }
            if !city.point.x.is_finite() || !city.point.y.is_finite() {
                return Err(TspGaError::InvalidCoordinate { id: city.id });
            }
            slots[id] = Some(city.point);
        }

        // Every slot 1..=n is filled: n distinct ids in 1..=n.
        let mut points: Vec<Point> = slots.into_iter().flatten().collect();
        let sentinel = points[0];
        points.insert(0, sentinel);

        Ok(Self { points })
    }

    /// Builds the table from a mapping of city id to `(x, y)`.
    pub fn from_coords<I>(coords: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, (f32, f32))>,
    {
        Self::new(coords.into_iter().map(|(id, (x, y))| City::new(id, x, y)))
    }

    /// Number of real cities (the sentinel slot is not counted).
    pub fn num_cities(&self) -> usize {
        self.points.len() - 1
    }

    /// Coordinate of city `id`.
    ///
    /// # Panics
    /// Panics if `id > num_cities()`.
    pub fn point(&self, id: u32) -> Point {
        self.points[id as usize]
    }

    /// Device layout: sentinel followed by cities `1..=n`.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Iterates over the cities in id order.
    pub fn cities(&self) -> impl Iterator<Item = City> + '_ {
        self.points
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, p)| City {
                id: id as u32,
                point: *p,
            })
    }

    /// Distance between two cities.
    pub fn distance(&self, a: u32, b: u32) -> f32 {
        self.point(a).distance(&self.point(b))
    }
}
