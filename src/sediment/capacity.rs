//! Shear stress and per-fraction entrainment capacity.

use super::config::TransportLaw;
use crate::grid::{GrainSet, Parcel};

/// Water density (kg/m^3).
pub const RHO_WATER: f64 = 1000.0;
/// Sediment density (kg/m^3).
pub const RHO_SEDIMENT: f64 = 2650.0;
/// Seconds to years, used by the bedrock incision law.
pub const SECONDS_TO_YEARS: f64 = 3.17e-8;

/// Bed shear stress (Pa) from the resultant velocity.
///
/// `slope_term` is the velocity-weighted sum of bed slopes toward the
/// outflow neighbours; only adverse (negative) values reduce the stress.
pub fn shear_stress(velocity: f64, slope_term: f64, depth: f64, manning: f64, gravity: f64) -> f64 {
    if velocity <= 0.0 || depth <= 0.0 {
        return 0.0;
    }
    let ci = gravity * manning * manning * depth.powf(-0.33);
    let slope_term = slope_term.min(0.0);
    (RHO_WATER * ci * velocity * velocity * (1.0 + slope_term / velocity)).max(0.0)
}

/// Inputs shared by every fraction of one cell.
pub struct CapacityInput<'a> {
    pub tau: f64,
    pub parcel: &'a Parcel,
    pub grains: &'a GrainSet,
    pub sand_limit: f64,
    pub gravity: f64,
    /// `mult * dt` in seconds.
    pub duration: f64,
    pub cell_size: f64,
}

impl TransportLaw {
    /// Transportable volume (m per unit area) of each fraction over
    /// `input.duration`, before availability clamps.
    pub fn entrainment(&self, input: &CapacityInput<'_>, out: &mut [f64]) {
        let tau = input.tau;
        out.iter_mut().for_each(|v| *v = 0.0);
        if tau <= 0.0 {
            return;
        }
        let g = input.gravity;
        let grains = input.grains;
        let active_total = input.parcel.active_total();
        let scale = input.duration / input.cell_size;

        match *self {
            TransportLaw::WilcockCrowe => {
                if active_total <= 0.0 {
                    return;
                }
                let d50 = input.parcel.d50(&grains.diameters).max(grains.diameters[0]);
                let fs = input.parcel.sand_fraction(&grains.diameters, input.sand_limit);
                let u_star = (tau / RHO_WATER).sqrt();
                for (n, v) in out.iter_mut().enumerate() {
                    let di = grains.diameters[n];
                    let fi = input.parcel.active[n].max(0.0) / active_total;
                    let exponent = 0.67 / (1.0 + (1.5 - di / d50).exp());
                    let tau_ri = (0.021 + 0.015 * (-20.0 * fs).exp())
                        * (RHO_WATER * g * d50)
                        * (di / d50).powf(exponent);
                    let ratio = tau / tau_ri;
                    let w_star = if ratio < 1.35 {
                        0.002 * ratio.powf(7.5)
                    } else {
                        14.0 * (1.0 - 0.894 / ratio.sqrt()).powf(4.5)
                    };
                    *v = scale * (fi * u_star.powi(3) / ((RHO_SEDIMENT / RHO_WATER - 1.0) * g)) * w_star;
                }
            }
            TransportLaw::Einstein => {
                for (n, v) in out.iter_mut().enumerate() {
                    let di = grains.diameters[n];
                    let psi_inv = 1.0 / (((RHO_SEDIMENT - RHO_WATER) * di) / (tau / g));
                    let phi = 40.0 * psi_inv.powi(3);
                    *v = scale * phi / (RHO_WATER / ((2250.0 - RHO_WATER) * g * di.powi(3))).sqrt();
                }
            }
            TransportLaw::MeyerPeterMuller {
                critical_shields,
                coefficient,
            } => {
                if active_total <= 0.0 {
                    return;
                }
                let submerged = RHO_SEDIMENT / RHO_WATER - 1.0;
                for (n, v) in out.iter_mut().enumerate() {
                    let di = grains.diameters[n];
                    let theta = tau / ((RHO_SEDIMENT - RHO_WATER) * g * di);
                    if theta <= critical_shields {
                        continue;
                    }
                    let fi = input.parcel.active[n].max(0.0) / active_total;
                    let q_star = coefficient * (theta - critical_shields).powf(1.5);
                    let qb = q_star * (submerged * g * di.powi(3)).sqrt();
                    *v = scale * fi * qb;
                }
            }
        }
    }
}

/// Bedrock lowering (m) for shear `tau` over `duration` seconds.
pub fn bedrock_incision(tau: f64, critical: f64, erodibility: f64, duration: f64) -> f64 {
    if erodibility <= 0.0 || tau <= critical {
        return 0.0;
    }
    erodibility * (tau - critical).powf(1.5) * duration * SECONDS_TO_YEARS
}
