//! Monthly soil development: soil production from bedrock and physical
//! weathering of the tracked column.

use rayon::prelude::*;

use super::config::{BedrockLowering, PhysicalWeathering, SoilDevelopmentConfig};
use crate::grid::{is_nodata, World};

const MONTHS_PER_YEAR: f64 = 12.0;

/// Bedrock lowering for one month under `soil` metres of cover.
pub fn bedrock_lowering(config: &BedrockLowering, soil: f64) -> f64 {
    let h = if soil == 0.0 { 0.001 } else { soil };
    config.p1 * (-config.b1 * h).exp() / MONTHS_PER_YEAR
}

/// Share of fraction mass broken down in one month at `depth_factor`
/// active-layer thicknesses below the surface.
fn breakdown_share(config: &PhysicalWeathering, diameter: f64, thickness: f64, depth_factor: f64) -> f64 {
    let log = (diameter * 0.001).ln();
    if log >= 0.0 {
        return 0.0;
    }
    let share = -(config.k1 * (-config.c1 * thickness * depth_factor).exp() * (config.c2 / log)) / MONTHS_PER_YEAR;
    share.clamp(0.0, 1.0)
}

/// Breaks each fraction above the finest down into finer classes: the
/// second class feeds the first, coarser classes send 5% one class down
/// and 95% two classes down.
fn weather_layer(layer: &mut [f64], diameters: &[f64], config: &PhysicalWeathering, thickness: f64, depth_factor: f64) {
    for n in 1..layer.len() {
        if layer[n] <= 0.0 {
            continue;
        }
        let amount = layer[n] * breakdown_share(config, diameters[n], thickness, depth_factor);
        layer[n] -= amount;
        if n == 1 {
            layer[0] += amount;
        } else {
            layer[n - 1] += amount * 0.05;
            layer[n - 2] += amount * 0.95;
        }
    }
}

/// Applies one month of soil development to every valid cell, creating
/// parcels where needed.
pub fn develop_soil(world: &mut World, config: &SoilDevelopmentConfig) {
    let World {
        grains,
        elev,
        bedrock,
        parcels,
        ..
    } = world;
    let grains = &*grains;
    let thickness = grains.active_thickness;

    parcels
        .par_iter_mut()
        .zip(bedrock.par_iter_mut())
        .zip(elev.par_iter())
        .for_each(|((parcel, bedrock), &elev)| {
            if is_nodata(elev) {
                return;
            }
            let parcel = parcel.get_or_insert_with(|| grains.new_parcel(elev, *bedrock));

            if let Some(lowering) = &config.bedrock_lowering {
                if !is_nodata(*bedrock) && elev >= *bedrock {
                    *bedrock -= bedrock_lowering(lowering, elev - *bedrock);
                }
            }

            if let Some(weathering) = &config.weathering {
                weather_layer(&mut parcel.active, &grains.diameters, weathering, thickness, 0.5);
                for (z, layer) in parcel.strata.iter_mut().enumerate() {
                    weather_layer(layer, &grains.diameters, weathering, thickness, (z + 1) as f64);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::sediment::SedimentConfig;

    fn world() -> World {
        let mut b = Bootstrap::flat(3, 3, 1.0, 5.0);
        b.bedrock = Some(vec![4.0; 9]);
        World::from_bootstrap(&b, &SedimentConfig::default()).unwrap()
    }

    #[test]
    fn test_lowering_decays_with_soil_depth() {
        let c = BedrockLowering::default();
        assert!(bedrock_lowering(&c, 0.1) > bedrock_lowering(&c, 1.0));
        assert_eq!(bedrock_lowering(&c, 0.0), bedrock_lowering(&c, 0.001));
    }

    #[test]
    fn test_weathering_fines_and_conserves() {
        let diameters = SedimentConfig::default().diameters();
        let mut layer = vec![1.0; diameters.len()];
        let config = PhysicalWeathering {
            k1: 0.5,
            ..PhysicalWeathering::default()
        };
        weather_layer(&mut layer, &diameters, &config, 0.2, 0.5);
        let total: f64 = layer.iter().sum();
        assert!((total - diameters.len() as f64).abs() < 1e-12);
        assert!(layer[0] > 1.0);
        assert!(layer[8] < 1.0);
    }

    #[test]
    fn test_deeper_strata_weather_slower() {
        let diameters = SedimentConfig::default().diameters();
        let config = PhysicalWeathering::default();
        let shallow = breakdown_share(&config, diameters[5], 0.2, 1.0);
        let deep = breakdown_share(&config, diameters[5], 0.2, 5.0);
        assert!(shallow > deep);
    }

    #[test]
    fn test_develop_soil_lowers_bedrock_and_creates_parcels() {
        let mut w = world();
        let config = SoilDevelopmentConfig {
            bedrock_lowering: Some(BedrockLowering::default()),
            weathering: Some(PhysicalWeathering::default()),
        };
        develop_soil(&mut w, &config);
        assert!(w.bedrock.iter().all(|b| *b < 4.0));
        assert!(w.parcels.iter().all(Option::is_some));
        assert!(w.elev.iter().all(|e| *e == 5.0));
    }
}
