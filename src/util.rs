use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compact display for metric values: `1234567.0` becomes `1.23M`.
pub fn format_metric(value: f64) -> String {
    const UNITS: [&str; 5] = ["", "k", "M", "B", "T"];

    if !value.is_finite() {
        return value.to_string();
    }

    let mut scaled = value.abs();
    let mut unit = 0usize;
    while scaled >= 1000.0 && unit < UNITS.len() - 1 {
        scaled /= 1000.0;
        unit += 1;
    }

    let sign = if value < 0.0 { "-" } else { "" };
    if unit == 0 {
        if scaled.fract() == 0.0 {
            format!("{sign}{scaled:.0}")
        } else {
            format!("{sign}{scaled:.3}")
        }
    } else {
        format!("{sign}{scaled:.2}{}", UNITS[unit])
    }
}

/// Deterministic pair in [-1, 1] derived from `id`.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}
