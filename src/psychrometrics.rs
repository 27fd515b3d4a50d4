//! Water vapour pressure helpers

/// Saturation vapour pressure (kPa) at temperature `t` (°C), Antoine equation
pub fn saturation_vapor_pressure(t: f64) -> f64 {
    (16.6536 - 4030.183 / (t + 235.0)).exp()
}

/// Returns (vapour pressure, saturation vapour pressure) in kPa
pub fn vapor_pressure(t: f64, relative_humidity: f64) -> (f64, f64) {
    let p_sat = saturation_vapor_pressure(t);
    (p_sat * relative_humidity / 100.0, p_sat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturation_at_known_points() {
        // ~3.17 kPa at 25 °C, ~6.28 kPa at 37 °C
        assert!((saturation_vapor_pressure(25.0) - 3.17).abs() < 0.02);
        assert!((saturation_vapor_pressure(37.0) - 6.28).abs() < 0.05);
    }

    #[test]
    fn test_vapor_pressure_scales_with_humidity() {
        let (pa, psat) = vapor_pressure(30.0, 50.0);
        assert!((pa - psat / 2.0).abs() < 1e-12);
        assert_eq!(vapor_pressure(30.0, 0.0).0, 0.0);
    }
}
