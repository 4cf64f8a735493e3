use super::ReadingGenerator;
use crate::device::model::SensorAttribute;
use rand::Rng;
use std::f64::consts::PI;

const TEMPERATURE_RANGE: (f64, f64) = (-10.0, 50.0);
const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);

/// Daily temperature and humidity cycle with ±1 of random noise
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherGenerator;

impl ReadingGenerator for WeatherGenerator {
    fn generate(&self, hour_of_day: u32) -> Vec<SensorAttribute> {
        let mut rng = rand::thread_rng();
        let (temperature, humidity) =
            daily_cycle(hour_of_day, rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        vec![
            SensorAttribute::new("Temperature", temperature),
            SensorAttribute::new("Humidity", humidity),
        ]
    }
}

/// Sine wave for temperature, cosine for humidity, clamped to plausible ranges
pub fn daily_cycle(hour_of_day: u32, temperature_noise: f64, humidity_noise: f64) -> (f64, f64) {
    let phase = (hour_of_day as f64 / 24.0) * 2.0 * PI;
    let temperature = 20.0 + 10.0 * phase.sin() + temperature_noise;
    let humidity = 50.0 + 30.0 * phase.cos() + humidity_noise;
    (
        temperature.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1),
        humidity.clamp(HUMIDITY_RANGE.0, HUMIDITY_RANGE.1),
    )
}
