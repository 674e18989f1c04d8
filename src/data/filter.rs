use serde::{Deserialize, Serialize};

use super::error::{DataError, Result};
use super::grid::SweepGrid;

// ---------------------------------------------------------------------------
// Selection along the environmental axis
// ---------------------------------------------------------------------------

/// Which measurements of a sweep to keep.
///
/// * `range` set → keep `x0 <= x <= x1` (any `mask` is ignored)
/// * only `mask` set → keep the measurements whose entry is true
/// * neither → keep everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub range: Option<(f64, f64)>,
    pub mask: Option<Vec<bool>>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn range(x0: f64, x1: f64) -> Self {
        Self {
            range: Some((x0, x1)),
            mask: None,
        }
    }

    pub fn mask(mask: Vec<bool>) -> Self {
        Self {
            range: None,
            mask: Some(mask),
        }
    }
}

/// Evaluate `selection` against the environmental values `x`.
pub fn selection_mask(x: &[f64], selection: &Selection) -> Result<Vec<bool>> {
    if let Some((x0, x1)) = selection.range {
        return Ok(x.iter().map(|&v| v >= x0 && v <= x1).collect());
    }
    if let Some(mask) = &selection.mask {
        if mask.len() != x.len() {
            return Err(DataError::Configuration(format!(
                "selection has {} entries but the sweep has {} measurements",
                mask.len(),
                x.len()
            )));
        }
        return Ok(mask.clone());
    }
    Ok(x.iter().map(|&v| v > f64::NEG_INFINITY).collect())
}

/// Restrict a sweep to the selected measurements. The grid keeps its layout.
pub fn select_grid(grid: &SweepGrid, selection: &Selection) -> Result<SweepGrid> {
    let mask = selection_mask(&grid.x_values(), selection)?;
    Ok(match grid {
        SweepGrid::Regular(g) => SweepGrid::Regular(g.select_columns(&mask)),
        SweepGrid::Irregular(g) => SweepGrid::Irregular(g.select_columns(&mask)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::grid::{GridKind, IrregularGrid, RegularGrid};

    fn regular() -> SweepGrid {
        SweepGrid::Regular(
            RegularGrid::from_columns(
                &[0.0, 0.1, 0.2, 0.3],
                &[&[-1.0, 1.0], &[-1.0, 1.0], &[-1.0, 1.0], &[-1.0, 1.0]],
                &[&[0.0, 1.0], &[0.0, 2.0], &[0.0, 3.0], &[0.0, 4.0]],
            )
            .unwrap(),
        )
    }

    #[test]
    fn range_is_inclusive() {
        let mask = selection_mask(&[0.0, 0.1, 0.2, 0.3], &Selection::range(0.1, 0.2)).unwrap();
        assert_eq!(mask, vec![false, true, true, false]);
    }

    #[test]
    fn range_takes_precedence_over_mask() {
        let sel = Selection {
            range: Some((0.25, 1.0)),
            mask: Some(vec![true, true, false, false]),
        };
        let grid = select_grid(&regular(), &sel).unwrap();
        assert_eq!(grid.x_values(), vec![0.3]);
    }

    #[test]
    fn mask_selects_and_keeps_variant() {
        let irregular = SweepGrid::Irregular(
            IrregularGrid::new(
                vec![1.0, 2.0, 3.0],
                vec![vec![0.0], vec![0.0, 1.0], vec![0.0, 1.0, 2.0]],
                vec![vec![5.0], vec![5.0, 6.0], vec![5.0, 6.0, 7.0]],
            )
            .unwrap(),
        );
        let out = select_grid(&irregular, &Selection::mask(vec![false, true, true])).unwrap();
        assert_eq!(out.kind(), GridKind::Irregular);
        assert_eq!(out.x_values(), vec![2.0, 3.0]);

        let out = select_grid(&regular(), &Selection::mask(vec![true, false, false, true])).unwrap();
        assert_eq!(out.kind(), GridKind::Regular);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn no_selection_keeps_everything() {
        assert_eq!(select_grid(&regular(), &Selection::all()).unwrap(), regular());
    }

    #[test]
    fn mask_length_must_match() {
        assert!(matches!(
            select_grid(&regular(), &Selection::mask(vec![true])),
            Err(DataError::Configuration(_))
        ));
    }
}
