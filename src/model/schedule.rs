//! Cadences of the periodic processes.

use crate::slope::SlopeConfig;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Processes run on a simulated-time cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessId {
    Evaporation,
    Creep,
    SoilErosion,
    Siberia,
    WholeGridSlide,
    SoilDevelopment,
}

impl ProcessId {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessId::Evaporation => "evaporation",
            ProcessId::Creep => "creep",
            ProcessId::SoilErosion => "soil-erosion",
            ProcessId::Siberia => "siberia",
            ProcessId::WholeGridSlide => "whole-grid-slide",
            ProcessId::SoilDevelopment => "soil-development",
        }
    }
}

/// A repeating deadline. Each firing moves the deadline by one interval,
/// so a long step that skips several deadlines catches up over the
/// following iterations.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval: f64,
    next: f64,
}

impl Cadence {
    pub fn new(interval: f64, start: f64) -> Self {
        Self { interval, next: start }
    }

    pub fn days(days: f64) -> Self {
        Self::new(days * SECONDS_PER_DAY, 0.0)
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// True once `time` has passed the deadline.
    pub fn fire(&mut self, time: f64) -> bool {
        if time > self.next {
            self.next += self.interval;
            true
        } else {
            false
        }
    }
}

/// Ordered set of time-driven processes.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<(ProcessId, Cadence)>,
}

impl Schedule {
    /// Builds the schedule for the enabled slope processes, plus daily
    /// evaporation when `evaporation` is set.
    pub fn new(slope: &SlopeConfig, evaporation: bool) -> Self {
        let mut schedule = Self::default();
        if evaporation {
            schedule.add(ProcessId::Evaporation, Cadence::days(1.0));
        }
        if let Some(creep) = &slope.creep {
            schedule.add(ProcessId::Creep, Cadence::days(creep.interval_days));
        }
        if let Some(soil) = &slope.soil_erosion {
            schedule.add(ProcessId::SoilErosion, Cadence::days(soil.interval_days));
        }
        if let Some(siberia) = &slope.siberia {
            schedule.add(ProcessId::Siberia, Cadence::days(siberia.interval_days));
        }
        if slope.landslide.as_ref().is_some_and(|l| l.whole_grid) {
            schedule.add(ProcessId::WholeGridSlide, Cadence::days(1.0));
        }
        if slope.soil_development.is_some() {
            schedule.add(ProcessId::SoilDevelopment, Cadence::days(365.0 / 12.0));
        }
        schedule
    }

    pub fn add(&mut self, id: ProcessId, cadence: Cadence) -> &mut Self {
        self.entries.push((id, cadence));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Processes due at `time`, in schedule order.
    pub fn due(&mut self, time: f64) -> Vec<ProcessId> {
        self.entries
            .iter_mut()
            .filter_map(|(id, cadence)| cadence.fire(time).then_some(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slope::{SoilDevelopmentConfig, SoilErosionConfig};

    #[test]
    fn test_cadence_fires_once_per_interval() {
        let mut c = Cadence::new(10.0, 0.0);
        assert!(!c.fire(0.0));
        assert!(c.fire(1.0));
        assert!(!c.fire(5.0));
        assert!(c.fire(10.5));
        // A long jump catches up one deadline at a time.
        assert!(c.fire(45.0));
        assert!(c.fire(45.0));
        assert!(c.fire(45.0));
        assert!(!c.fire(45.0));
    }

    #[test]
    fn test_default_slope_schedule() {
        let mut s = Schedule::new(&SlopeConfig::default(), false);
        assert_eq!(s.len(), 1);
        assert_eq!(s.due(1.0), vec![ProcessId::Creep]);
        assert!(s.due(SECONDS_PER_DAY).is_empty());
        assert_eq!(s.due(10.0 * SECONDS_PER_DAY + 1.0), vec![ProcessId::Creep]);
    }

    #[test]
    fn test_order_and_names() {
        let slope = SlopeConfig {
            soil_erosion: Some(SoilErosionConfig::default()),
            soil_development: Some(SoilDevelopmentConfig::default()),
            ..SlopeConfig::default()
        };
        let mut s = Schedule::new(&slope, true);
        let due = s.due(1.0);
        let names: Vec<_> = due.iter().map(ProcessId::name).collect();
        assert_eq!(names, ["evaporation", "creep", "soil-erosion", "soil-development"]);
        assert!(Schedule::new(&SlopeConfig::disabled(), false).is_empty());
    }
}
