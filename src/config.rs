/// Application-level constants
pub const APP_NAME: &str = "Tagihan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "tagihan_lib=info,tagihan=info"
}

/// Read an integer knob with a safe fallback and a lower bound.
/// Unparsable values fall back to the default; values below `minimum` clamp up.
pub fn lookup_usize<F>(lookup: &F, name: &str, default: usize, minimum: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(value) => value.max(minimum as i64) as usize,
            Err(_) => default,
        },
        None => default,
    }
}

/// Read a float knob with a safe fallback and a lower bound.
pub fn lookup_f32<F>(lookup: &F, name: &str, default: f32, minimum: f32) -> f32
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).map(|raw| raw.trim().parse::<f32>()) {
        Some(Ok(value)) if value.is_finite() => value.max(minimum),
        _ => default,
    }
}

/// Read a boolean knob. Accepts 1/true/yes/on and 0/false/no/off.
pub fn lookup_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).map(|raw| raw.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// Read a string knob, ignoring blank values.
pub fn lookup_string<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| raw.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
