//! Bank curvature estimation.
//!
//! Channel cells are those with shear above a threshold. Dry cells touching
//! the channel are banks; each bank gets a signed inside/outside score from
//! a double-resolution wet/dry mask, the scores are smoothed along the
//! bank, converted to an inverse radius and finally spread across the
//! channel. The result lands in `World::edge`, where the sediment step uses
//! it to steer bedload toward outer banks and the bank pass uses it as the
//! dry-bank erodibility.

use rayon::prelude::*;

use super::config::LateralConfig;
use crate::grid::{is_nodata, World, NEIGHBORS_8, NODATA};

const WET: u8 = 1;
const BOUNDARY: u8 = 2;

/// Cells carrying enough shear to count as channel. Isolated channel cells
/// with more than six non-channel neighbours are dropped.
fn channel_mask(world: &World, shear: f64) -> Vec<bool> {
    let g = world.geometry;
    let mut mask = vec![false; g.len()];
    for i in world.active.cells(&g) {
        let (x, y) = g.coords(i);
        if !g.is_interior(x, y) || world.tau[i] <= shear {
            continue;
        }
        let dry = NEIGHBORS_8
            .iter()
            .filter_map(|&(dx, dy, _)| g.offset(x, y, dx, dy))
            .filter(|&j| world.tau[j] < shear)
            .count();
        mask[i] = dry <= 6;
    }
    mask
}

/// Signed wet-minus-dry score of every bank cell, capped at +-2. Cells
/// that are not banks carry `NODATA`.
fn bank_scores(world: &World, channel: &[bool]) -> Vec<f64> {
    let g = world.geometry;
    let (cols, rows) = (g.cols, g.rows);
    let mut score = vec![NODATA; g.len()];

    let (ucols, urows) = (cols * 2, rows * 2);
    let mut up = vec![0u8; ucols * urows];
    for y in 1..rows - 1 {
        for x in 1..cols - 1 {
            let i = g.index(x, y);
            if channel[i] {
                for (bx, by) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    up[(2 * y + by) * ucols + 2 * x + bx] = WET;
                }
                continue;
            }
            let around = [i - cols, i - 1, i + 1, i + cols].map(|j| channel[j]);
            if around.iter().any(|&c| c) && !around.iter().all(|&c| c) {
                score[i] = 0.0;
            }
        }
    }

    for v in 1..urows - 1 {
        for u in 1..ucols - 1 {
            let k = v * ucols + u;
            if up[k] == 0 && [k - ucols, k - 1, k + 1, k + ucols].iter().any(|&j| up[j] == WET) {
                up[k] = BOUNDARY;
            }
        }
    }

    let mut fine = vec![0i32; ucols * urows];
    for v in 1..urows - 1 {
        for u in 1..ucols - 1 {
            let k = v * ucols + u;
            if up[k] != BOUNDARY {
                continue;
            }
            let (mut wet, mut dry, mut boundary) = (0, 0, 1);
            for j in [k - ucols, k - 1, k + 1, k + ucols] {
                match up[j] {
                    WET => wet += 1,
                    BOUNDARY => boundary += 1,
                    _ => dry += 1,
                }
            }
            if boundary > 3 {
                dry += boundary - 2;
            }
            fine[k] = wet - dry;
        }
    }

    for (i, s) in score.iter_mut().enumerate() {
        if *s != 0.0 {
            continue;
        }
        let (x, y) = g.coords(i);
        let sum: i32 = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .iter()
            .map(|(bx, by)| fine[(2 * y + by) * ucols + 2 * x + bx])
            .sum();
        *s = f64::from(sum.clamp(-2, 2));
    }
    score
}

/// Mean water-surface elevation of the wet 8-neighbours, or 0 if none.
fn neighbour_water_surface(world: &World, threshold: f64) -> Vec<f64> {
    let g = world.geometry;
    (0..g.len())
        .into_par_iter()
        .map(|i| {
            let (x, y) = g.coords(i);
            let (sum, count) = NEIGHBORS_8
                .iter()
                .filter_map(|&(dx, dy, _)| g.offset(x, y, dx, dy))
                .filter(|&j| world.depth[j] > threshold && world.is_valid(j))
                .fold((0.0, 0), |(s, c), j| (s + world.depth[j] + world.elev[j], c + 1));
            if count > 0 {
                sum / count as f64
            } else {
                0.0
            }
        })
        .collect()
}

/// Whether bank neighbour `(x + dx, y + dy)` belongs to the same bank line
/// as `(x, y)`: a cardinal neighbour must share a channel diagonal, a
/// diagonal neighbour must not be cut off by channel on both sides.
fn same_bank(channel: &[bool], cols: usize, x: usize, y: usize, dx: i64, dy: i64) -> bool {
    let at = |ox: i64, oy: i64| channel[(y as i64 + oy) as usize * cols + (x as i64 + ox) as usize];
    if dx != 0 && dy != 0 {
        !at(0, dy) || !at(dx, 0)
    } else if dx != 0 {
        at(dx, -1) || at(dx, 1)
    } else {
        at(-1, dy) || at(1, dy)
    }
}

/// Averages bank scores along the bank line. Passes beyond
/// `smoothing_passes` only take neighbours with a higher water surface.
fn smooth_banks(world: &World, config: &LateralConfig, channel: &[bool], score: &mut Vec<f64>, surface: &[f64]) {
    let g = world.geometry;
    let (cols, rows) = (g.cols, g.rows);
    let active = &world.active;
    let passes = config.smoothing_passes + config.downstream_shift;

    for pass in 1..=passes {
        let shifting = pass > config.smoothing_passes;
        let current = &*score;
        let mut next = current.clone();
        next.par_chunks_mut(cols).enumerate().for_each(|(y, row)| {
            if y == 0 || y + 1 >= rows {
                return;
            }
            for &x in active.row(y) {
                let i = y * cols + x;
                if x == 0 || x + 1 >= cols || is_nodata(current[i]) {
                    continue;
                }
                let mut mean = current[i];
                let mut num = 1.0;
                for &(dx, dy, _) in &NEIGHBORS_8 {
                    let j = (y as i64 + dy) as usize * cols + (x as i64 + dx) as usize;
                    if is_nodata(current[j]) || channel[j] {
                        continue;
                    }
                    if shifting && surface[j] <= surface[i] {
                        continue;
                    }
                    if same_bank(channel, cols, x, y, dx, dy) {
                        mean += current[j];
                        num += 1.0;
                    }
                }
                let near_edge = x < 2 || x + 4 > cols || y < 2 || y + 4 > rows;
                row[x] = if near_edge || mean == 0.0 { 0.0 } else { mean / num };
            }
        });
        *score = next;
    }
}

/// Spreads bank values across channel cells by repeated averaging of the
/// four neighbours until the largest change is below the tolerance.
fn spread_across_channel(world: &World, config: &LateralConfig, channel: &[bool], edge: &mut Vec<f64>) {
    let g = world.geometry;
    let (cols, rows) = (g.cols, g.rows);
    let active = &world.active;
    for (e, &c) in edge.iter_mut().zip(channel) {
        if c && is_nodata(*e) {
            *e = 0.0;
        }
    }

    for _ in 0..config.max_cross_channel_sweeps {
        let current = &*edge;
        let mut next = current.clone();
        let change = next
            .par_chunks_mut(cols)
            .enumerate()
            .map(|(y, row)| {
                let mut change = 0.0f64;
                if y == 0 || y + 1 >= rows {
                    return change;
                }
                for &x in active.row(y) {
                    let i = y * cols + x;
                    if x == 0 || x + 1 >= cols || !channel[i] || is_nodata(current[i]) {
                        continue;
                    }
                    let (sum, num) = [i - cols, i - 1, i + 1, i + cols]
                        .iter()
                        .filter(|&&j| !is_nodata(current[j]))
                        .fold((0.0, 0.0), |(s, n), &j| (s + current[j], n + 1.0));
                    if num > 0.0 {
                        row[x] = sum / num;
                        change = change.max((row[x] - current[i]).abs());
                    }
                }
                change
            })
            .reduce(|| 0.0, f64::max);
        *edge = next;
        if change <= config.cross_channel_tolerance {
            break;
        }
    }
}

/// Recomputes `world.edge` from the current shear and depth fields.
/// Cells with no bank or channel value get 0.
pub fn update_curvature(world: &mut World, config: &LateralConfig, depth_threshold: f64) {
    let g = world.geometry;
    if g.cols < 3 || g.rows < 3 {
        world.edge.iter_mut().for_each(|e| *e = 0.0);
        return;
    }
    let dx = g.cell_size;
    let channel = channel_mask(world, config.channel_shear);
    let mut score = bank_scores(world, &channel);
    let surface = neighbour_water_surface(world, depth_threshold);
    smooth_banks(world, config, &channel, &mut score, &surface);

    for (i, s) in score.iter_mut().enumerate() {
        if !is_nodata(*s) {
            // Only inner-bend (negative) scores carry curvature.
            let c = -s.min(0.0);
            *s = 1.0 / (2.131 * c.powf(-1.0794) * dx);
        } else if world.depth[i] > depth_threshold {
            *s = 0.0;
        }
    }

    spread_across_channel(world, config, &channel, &mut score);
    for (e, s) in world.edge.iter_mut().zip(&score) {
        *e = if is_nodata(*s) || !s.is_finite() { 0.0 } else { *s };
    }
}
