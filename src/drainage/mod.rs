//! Multiple-flow-direction drainage accumulation.
//!
//! Cells are swept from highest to lowest. Each cell passes its
//! accumulated contribution to every lower 8-neighbour in proportion to the
//! drop (diagonal drops divided by sqrt 2). Area is counted in cells.

use crate::grid::{is_nodata, GridGeometry, World, NEIGHBORS_8};

const DIAGONAL: f64 = std::f64::consts::SQRT_2;

/// Drainage area (cells) for an elevation raster.
///
/// # Arguments
/// * `geometry` - Raster geometry
/// * `elev` - Elevations, no-data cells marked with the sentinel
///
/// # Returns
/// The largest accumulation each cell received during the sweep. No-data
/// cells get 0. Cells with no lower neighbour keep what they received.
pub fn accumulate(geometry: &GridGeometry, elev: &[f64]) -> Vec<f64> {
    let n = geometry.len();
    assert_eq!(elev.len(), n);

    let mut order: Vec<usize> = (0..n).filter(|&i| !is_nodata(elev[i])).collect();
    order.sort_by(|&a, &b| elev[b].partial_cmp(&elev[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut carried: Vec<f64> = elev.iter().map(|&e| if is_nodata(e) { 0.0 } else { 1.0 }).collect();
    let mut area = vec![0.0f64; n];
    let mut drops = [(0usize, 0.0f64); 8];

    for &i in &order {
        area[i] = area[i].max(carried[i]);
        let (x, y) = geometry.coords(i);

        let mut count = 0;
        let mut total = 0.0;
        for &(dx, dy, diagonal) in &NEIGHBORS_8 {
            let Some(j) = geometry.offset(x, y, dx, dy) else {
                continue;
            };
            if is_nodata(elev[j]) || elev[j] >= elev[i] {
                continue;
            }
            let mut drop = elev[i] - elev[j];
            if diagonal {
                drop /= DIAGONAL;
            }
            drops[count] = (j, drop);
            count += 1;
            total += drop;
        }

        if total > 0.0 {
            let share = carried[i];
            for &(j, drop) in &drops[..count] {
                carried[j] += share * drop / total;
            }
            carried[i] = 0.0;
        }
    }

    area
}

/// Recomputes `world.area` from the current elevations.
pub fn accumulate_drainage(world: &mut World) {
    world.area = accumulate(&world.geometry, &world.elev);
}
