//! Typed lookups into a flat `serde_json::Value` override object.
//!
//! Each helper takes the object, a key and the current value. Missing keys
//! and wrong types keep the current value, so applying overrides never fails.

use crate::color::Rgba;
use serde_json::Value;

/// Extracts an `f64` from `params[name]`. Integers are accepted.
pub fn param_f64(params: &Value, name: &str, default: f64) -> f64 {
    params.get(name).and_then(Value::as_f64).unwrap_or(default)
}

/// Extracts a non-negative integer from `params[name]` as `usize`.
pub fn param_usize(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Extracts a non-negative integer from `params[name]` as `u64`.
pub fn param_u64(params: &Value, name: &str, default: u64) -> u64 {
    params.get(name).and_then(Value::as_u64).unwrap_or(default)
}

/// Extracts a `bool` from `params[name]`.
pub fn param_bool(params: &Value, name: &str, default: bool) -> bool {
    params.get(name).and_then(Value::as_bool).unwrap_or(default)
}

/// Extracts a `String` from `params[name]`.
pub fn param_string(params: &Value, name: &str, default: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| default.to_owned())
}

/// Extracts a hex color (`#rrggbb` or `#rrggbbaa`) from `params[name]`.
///
/// Unparseable strings keep `default`.
pub fn param_color(params: &Value, name: &str, default: Rgba) -> Rgba {
    params
        .get(name)
        .and_then(Value::as_str)
        .and_then(|s| Rgba::from_hex(s).ok())
        .unwrap_or(default)
}

/// Returns true if `params[name]` is present but not of the type `accepts` checks.
///
/// Used to log overrides that were ignored.
pub fn param_mistyped(params: &Value, name: &str, accepts: fn(&Value) -> bool) -> bool {
    params.get(name).is_some_and(|v| !accepts(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_f64_extracts_float_and_integer() {
        let params = json!({"noise_scale": 0.009, "grid_spacing": 40});
        assert!((param_f64(&params, "noise_scale", 1.0) - 0.009).abs() < f64::EPSILON);
        assert!((param_f64(&params, "grid_spacing", 0.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn param_f64_keeps_default_for_missing_or_wrong_type() {
        let params = json!({"noise_scale": "fine"});
        assert_eq!(param_f64(&params, "noise_scale", 0.5), 0.5);
        assert_eq!(param_f64(&params, "evolution_speed", 0.25), 0.25);
        assert_eq!(param_f64(&json!(null), "noise_scale", 3.0), 3.0);
    }

    #[test]
    fn param_usize_rejects_floats_and_negatives() {
        let params = json!({"a": 2.5, "b": -1, "c": 200});
        assert_eq!(param_usize(&params, "a", 9), 9);
        assert_eq!(param_usize(&params, "b", 9), 9);
        assert_eq!(param_usize(&params, "c", 9), 200);
    }

    #[test]
    fn param_u64_extracts_integer() {
        let params = json!({"seed": 1337});
        assert_eq!(param_u64(&params, "seed", 0), 1337);
        assert_eq!(param_u64(&params, "other", 4), 4);
    }

    #[test]
    fn param_bool_extracts_or_defaults() {
        let params = json!({"reduced_motion": true, "halo": 1});
        assert!(param_bool(&params, "reduced_motion", false));
        assert!(!param_bool(&params, "halo", false));
    }

    #[test]
    fn param_string_extracts_or_defaults() {
        let params = json!({"boundary": "wrap", "kind": 3});
        assert_eq!(param_string(&params, "boundary", "respawn"), "wrap");
        assert_eq!(param_string(&params, "kind", "permutation"), "permutation");
    }

    #[test]
    fn param_color_parses_hex_with_alpha() {
        let params = json!({"particle_color": "#00c8ffb8"});
        let c = param_color(&params, "particle_color", Rgba::WHITE);
        assert!((c.b - 1.0).abs() < 1e-9);
        assert!((c.a - 184.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn param_color_keeps_default_on_bad_hex() {
        let params = json!({"particle_color": "#zzz"});
        assert_eq!(param_color(&params, "particle_color", Rgba::BLACK), Rgba::BLACK);
    }

    #[test]
    fn param_mistyped_flags_only_present_wrong_types() {
        let params = json!({"particle_count": "many", "grid_spacing": 30});
        assert!(param_mistyped(&params, "particle_count", Value::is_u64));
        assert!(!param_mistyped(&params, "grid_spacing", Value::is_number));
        assert!(!param_mistyped(&params, "absent", Value::is_number));
    }
}
