use crate::config::GridSettings;
use crate::error::{Error, Result};

/// Absorbs binary noise in `(max - min) / resolution` so a bound that sits
/// on a grid line is always included.
const STEP_EPSILON: f64 = 1e-9;

/// Coordinates are snapped to this many decimals to strip accumulated
/// representation error (`0.1 * 3` renders as `0.3`).
const COORDINATE_DECIMALS: i32 = 9;

/// Upper bound on the number of cells a grid may describe.
pub const MAX_GRID_CELLS: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Enumerates the offline grid, x in the outer loop and y in the inner one.
///
/// Positions are computed from integer step indices (`min + i * resolution`),
/// never by repeated addition, so the traversal is identical on every run.
#[derive(Debug, Clone)]
pub struct GridEnumerator {
    settings: GridSettings,
    x_count: usize,
    y_count: usize,
    len: usize,
}

impl GridEnumerator {
    pub fn new(settings: &GridSettings) -> Result<Self> {
        settings.validate()?;
        let x_count = axis_count("x", settings.x_min, settings.x_max, settings.resolution)?;
        let y_count = axis_count("y", settings.y_min, settings.y_max, settings.resolution)?;
        let len = x_count
            .checked_mul(y_count)
            .filter(|cells| *cells <= MAX_GRID_CELLS)
            .ok_or_else(|| {
                Error::InvalidGrid(format!(
                    "{} x {} positions exceed the limit of {} cells",
                    x_count, y_count, MAX_GRID_CELLS
                ))
            })?;
        Ok(Self {
            settings: *settings,
            x_count,
            y_count,
            len,
        })
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn x_count(&self) -> usize {
        self.x_count
    }

    pub fn y_count(&self) -> usize {
        self.y_count
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn x_values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.x_count()).map(move |i| self.x_at(i))
    }

    pub fn y_values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.y_count()).map(move |j| self.y_at(j))
    }

    /// A fresh pass over every cell. Each call starts from the first cell.
    pub fn iter(&self) -> GridIter<'_> {
        GridIter {
            grid: self,
            next: 0,
            end: self.len(),
        }
    }

    /// Cell at position `index` of the traversal order.
    pub fn cell(&self, index: usize) -> Option<GridCell> {
        if index >= self.len() {
            return None;
        }
        let y_count = self.y_count();
        Some(GridCell {
            x: self.x_at(index / y_count),
            y: self.y_at(index % y_count),
            z: self.settings.z,
        })
    }

    fn x_at(&self, i: usize) -> f64 {
        snap(self.settings.x_min + i as f64 * self.settings.resolution)
    }

    fn y_at(&self, j: usize) -> f64 {
        snap(self.settings.y_min + j as f64 * self.settings.resolution)
    }
}

impl<'a> IntoIterator for &'a GridEnumerator {
    type Item = GridCell;
    type IntoIter = GridIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct GridIter<'a> {
    grid: &'a GridEnumerator,
    next: usize,
    end: usize,
}

impl Iterator for GridIter<'_> {
    type Item = GridCell;

    fn next(&mut self) -> Option<GridCell> {
        if self.next >= self.end {
            return None;
        }
        let cell = self.grid.cell(self.next);
        self.next += 1;
        cell
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridIter<'_> {}

/// Number of positions along one axis, `floor((max - min) / res) + 1`.
fn axis_count(axis: &str, min: f64, max: f64, resolution: f64) -> Result<usize> {
    let steps = ((max - min) / resolution + STEP_EPSILON).floor();
    if !steps.is_finite() || steps < 0.0 || steps >= MAX_GRID_CELLS as f64 {
        return Err(Error::InvalidGrid(format!(
            "{} axis [{}, {}] at resolution {} exceeds the limit of {} cells",
            axis, min, max, resolution, MAX_GRID_CELLS
        )));
    }
    Ok(steps as usize + 1)
}

fn snap(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_DECIMALS);
    let snapped = (value * scale).round() / scale;
    // Keep -0.0 out of file names.
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;

    fn settings(x_min: f64, x_max: f64, y_min: f64, y_max: f64, resolution: f64) -> GridSettings {
        GridSettings {
            x_min,
            x_max,
            y_min,
            y_max,
            z: 1.5,
            resolution,
        }
    }

    #[test]
    fn test_traversal_order_x_outer_y_inner() {
        let grid = GridEnumerator::new(&settings(0.5, 1.5, 0.5, 2.5, 1.0)).unwrap();
        let cells: Vec<(f64, f64)> = grid.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(
            cells,
            vec![
                (0.5, 0.5),
                (0.5, 1.5),
                (0.5, 2.5),
                (1.5, 0.5),
                (1.5, 1.5),
                (1.5, 2.5)
            ]
        );
        assert!(grid.iter().all(|c| c.z == 1.5));
    }

    #[test]
    fn test_inclusive_upper_bound_with_inexact_resolution() {
        // Repeated addition of 0.1 ends at 0.9999999999999999 and then skips
        // or duplicates the last row depending on rounding.
        let grid = GridEnumerator::new(&settings(0.0, 1.0, 0.0, 0.0, 0.1)).unwrap();
        let xs: Vec<f64> = grid.x_values().collect();
        assert_eq!(xs.len(), 11);
        assert_eq!(xs[3], 0.3);
        assert_eq!(*xs.last().unwrap(), 1.0);
    }

    #[test]
    fn test_upper_bound_off_grid_is_excluded() {
        let grid = GridEnumerator::new(&settings(0.5, 2.0, 0.5, 0.5, 1.0)).unwrap();
        assert_eq!(grid.x_values().collect::<Vec<_>>(), vec![0.5, 1.5]);
    }

    #[test]
    fn test_single_cell_grid() {
        let grid = GridEnumerator::new(&settings(1.0, 1.0, 2.0, 2.0, 0.5)).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell(0), Some(GridCell { x: 1.0, y: 2.0, z: 1.5 }));
        assert_eq!(grid.cell(1), None);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(matches!(
            GridEnumerator::new(&settings(0.0, 1.0, 0.0, 1.0, 0.0)),
            Err(Error::InvalidGrid(_))
        ));
        assert!(matches!(
            GridEnumerator::new(&settings(0.0, 1.0, 0.0, 1.0, -0.5)),
            Err(Error::InvalidGrid(_))
        ));
        assert!(matches!(
            GridEnumerator::new(&settings(2.0, 1.0, 0.0, 1.0, 0.5)),
            Err(Error::InvalidGrid(_))
        ));
        assert!(matches!(
            GridEnumerator::new(&settings(0.0, 1.0, 3.0, 1.0, 0.5)),
            Err(Error::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_oversized_grid_is_rejected_not_overflowed() {
        let result = GridEnumerator::new(&settings(0.0, 1000.0, 0.0, 1000.0, 1e-8));
        assert!(matches!(result, Err(Error::InvalidGrid(_))));

        // Each axis fits on its own, the product does not.
        let result = GridEnumerator::new(&settings(0.0, 9_999.0, 0.0, 9_999.0, 1.0));
        assert!(matches!(result, Err(Error::InvalidGrid(_))));

        let grid = GridEnumerator::new(&settings(0.0, 999.0, 0.0, 9_999.0, 1.0)).unwrap();
        assert_eq!(grid.len(), MAX_GRID_CELLS);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let grid = GridEnumerator::new(&settings(0.5, 3.5, 0.5, 28.5, 1.0)).unwrap();
        let first: Vec<GridCell> = grid.iter().collect();
        let second: Vec<GridCell> = (&grid).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), grid.len());
        assert_eq!(grid.iter().len(), 4 * 29);
    }

    proptest! {
        #[test]
        fn prop_x_count_matches_step_formula(
            x_min in -50.0f64..50.0,
            span_steps in 0u32..200,
            resolution in prop::sample::select(vec![0.1, 0.25, 0.5, 1.0, 1.5, 2.0]),
        ) {
            let x_max = x_min + span_steps as f64 * resolution;
            let grid = GridEnumerator::new(&settings(x_min, x_max, 0.0, 0.0, resolution)).unwrap();
            let xs: Vec<f64> = grid.x_values().collect();

            prop_assert_eq!(xs.len(), ((x_max - x_min) / resolution + STEP_EPSILON).floor() as usize + 1);
            prop_assert_eq!(xs.len(), span_steps as usize + 1);
            prop_assert!(*xs.last().unwrap() <= x_max + 1e-6);
        }

        #[test]
        fn prop_traversal_is_ordered_and_reproducible(
            x_min in -10.0f64..10.0,
            y_min in -10.0f64..10.0,
            x_span in 0.0f64..5.0,
            y_span in 0.0f64..5.0,
            resolution in 0.2f64..2.0,
        ) {
            let s = settings(x_min, x_min + x_span, y_min, y_min + y_span, resolution);
            let grid = GridEnumerator::new(&s).unwrap();
            let cells: Vec<GridCell> = grid.iter().collect();

            for pair in cells.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(a.x < b.x || (a.x == b.x && a.y < b.y));
            }
            prop_assert_eq!(cells, grid.iter().collect::<Vec<_>>());
        }
    }
}
