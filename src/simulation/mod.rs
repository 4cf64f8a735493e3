//! Telemetry simulation: reading generators and the per-device telemetry loop
//!
//! A [`ReadingGenerator`] turns the current hour of day into sensor attributes.
//! Generators are looked up by [`DeviceType`] in a [`GeneratorRegistry`]; types
//! without an entry tick without publishing anything.

pub mod telemetry;
pub mod weather;

use crate::device::model::SensorAttribute;
use crate::device::DeviceType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub trait ReadingGenerator: Send + Sync + fmt::Debug {
    /// Attributes for one sample, in publish order. `hour_of_day` is 0-23.
    fn generate(&self, hour_of_day: u32) -> Vec<SensorAttribute>;
}

#[derive(Debug, Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<DeviceType, Arc<dyn ReadingGenerator>>,
}

impl GeneratorRegistry {
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    pub fn register(&mut self, device_type: DeviceType, generator: Arc<dyn ReadingGenerator>) {
        self.generators.insert(device_type, generator);
    }

    pub fn generator_for(&self, device_type: DeviceType) -> Option<Arc<dyn ReadingGenerator>> {
        self.generators.get(&device_type).cloned()
    }
}

impl Default for GeneratorRegistry {
    /// Weather stations are the only simulated type producing readings so far
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(DeviceType::Weather, Arc::new(weather::WeatherGenerator));
        registry
    }
}
