//! Automatic node placement.

use crate::models::PositionUpdate;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const CENTER_X: f64 = 400.0;
const CENTER_Y: f64 = 300.0;
const MAX_RADIUS: f64 = 200.0;
const RADIUS_PER_NODE: f64 = 30.0;
const GRID_SPACING: f64 = 100.0;
const GRID_OFFSET: f64 = 100.0;

/// Supported layout algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutAlgorithm {
    /// Nodes evenly spaced on a circle around (400, 300).
    Circular,
    /// Nodes on a square grid with 100px spacing.
    Grid,
}

impl LayoutAlgorithm {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Circular => "circular",
            Self::Grid => "grid",
        }
    }
}

impl fmt::Display for LayoutAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported layout algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for LayoutAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "circular" => Ok(Self::Circular),
            "grid" => Ok(Self::Grid),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Computes coordinates for `ids` in the given order.
#[must_use]
pub fn compute(algorithm: LayoutAlgorithm, ids: &[i64]) -> Vec<PositionUpdate> {
    match algorithm {
        LayoutAlgorithm::Circular => circular(ids),
        LayoutAlgorithm::Grid => grid(ids),
    }
}

fn circular(ids: &[i64]) -> Vec<PositionUpdate> {
    let n = ids.len() as f64;
    let radius = MAX_RADIUS.min(n * RADIUS_PER_NODE);
    ids.iter()
        .enumerate()
        .map(|(i, &id)| {
            let angle = (i as f64 * 2.0 * PI) / n;
            PositionUpdate {
                id,
                x: CENTER_X + radius * angle.cos(),
                y: CENTER_Y + radius * angle.sin(),
            }
        })
        .collect()
}

fn grid(ids: &[i64]) -> Vec<PositionUpdate> {
    let cols = (ids.len() as f64).sqrt().ceil().max(1.0) as usize;
    ids.iter()
        .enumerate()
        .map(|(i, &id)| PositionUpdate {
            id,
            x: (i % cols) as f64 * GRID_SPACING + GRID_OFFSET,
            y: (i / cols) as f64 * GRID_SPACING + GRID_OFFSET,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("circular".parse(), Ok(LayoutAlgorithm::Circular));
        assert_eq!(" Grid ".parse(), Ok(LayoutAlgorithm::Grid));
        assert!("force".parse::<LayoutAlgorithm>().is_err());
    }

    #[test]
    fn test_circular_small_ring() {
        let positions = compute(LayoutAlgorithm::Circular, &[1, 2, 3, 4]);
        // radius = min(200, 4 * 30) = 120
        assert!(close(positions[0].x, 520.0));
        assert!(close(positions[0].y, 300.0));
        assert!(close(positions[1].x, 400.0));
        assert!(close(positions[1].y, 420.0));
        assert!(close(positions[2].x, 280.0));
        assert_eq!(positions[3].id, 4);
    }

    #[test]
    fn test_circular_radius_capped() {
        let ids: Vec<i64> = (1..=10).collect();
        let positions = compute(LayoutAlgorithm::Circular, &ids);
        assert!(close(positions[0].x, 600.0));
    }

    #[test]
    fn test_grid() {
        let ids: Vec<i64> = (1..=5).collect();
        let positions = compute(LayoutAlgorithm::Grid, &ids);
        // cols = ceil(sqrt(5)) = 3
        assert_eq!((positions[0].x, positions[0].y), (100.0, 100.0));
        assert_eq!((positions[2].x, positions[2].y), (300.0, 100.0));
        assert_eq!((positions[3].x, positions[3].y), (100.0, 200.0));
        assert_eq!((positions[4].x, positions[4].y), (200.0, 200.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(compute(LayoutAlgorithm::Circular, &[]).is_empty());
        assert!(compute(LayoutAlgorithm::Grid, &[]).is_empty());
    }
}
