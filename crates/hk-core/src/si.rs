//! Column labels carry their unit as `name (unit)`.

use crate::{HkError, HkResult, Real};

const PREFIXES: [(i32, &str); 17] = [
    (-24, "y"),
    (-21, "z"),
    (-18, "a"),
    (-15, "f"),
    (-12, "p"),
    (-9, "n"),
    (-6, "u"),
    (-3, "m"),
    (0, ""),
    (3, "k"),
    (6, "M"),
    (9, "G"),
    (12, "T"),
    (15, "P"),
    (18, "E"),
    (21, "Z"),
    (24, "Y"),
];

/// Split `"deflection (m)"` into `("deflection", "m")`.
pub fn split_data_label(label: &str) -> HkResult<(String, String)> {
    let label = label.trim();
    let bad = || HkError::Conversion {
        value: label.to_string(),
        target: "data label `name (unit)`",
    };
    if !label.ends_with(')') {
        return Err(bad());
    }
    let open = label.rfind(" (").ok_or_else(bad)?;
    let name = &label[..open];
    let unit = &label[open + 2..label.len() - 1];
    if name.is_empty() {
        return Err(bad());
    }
    Ok((name.to_string(), unit.to_string()))
}

pub fn join_data_label(name: &str, unit: &str) -> String {
    format!("{name} ({unit})")
}

/// Engineering exponent (multiple of 3) for `value`, clamped to the prefix table.
fn engineering_power(value: Real) -> i32 {
    if value == 0.0 || !value.is_finite() {
        return 0;
    }
    let exp = value.abs().log10().floor() as i32;
    (exp.div_euclid(3) * 3).clamp(-24, 24)
}

/// Pretty-print a value with an SI prefix, e.g. `pp_si(1.5e-9, "N", Some(2))`
/// gives `"1.50 nN"`.
pub fn pp_si(value: Real, unit: &str, decimals: Option<usize>) -> String {
    let power = engineering_power(value);
    let prefix = PREFIXES
        .iter()
        .find(|(p, _)| *p == power)
        .map(|(_, s)| *s)
        .unwrap_or("");
    let scaled = value / (10.0 as Real).powi(power);
    match decimals {
        Some(d) => format!("{scaled:.d$} {prefix}{unit}"),
        None => format!("{scaled} {prefix}{unit}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join() {
        let (name, unit) = split_data_label("surface distance (m)").unwrap();
        assert_eq!(name, "surface distance");
        assert_eq!(unit, "m");
        assert_eq!(join_data_label(&name, &unit), "surface distance (m)");
    }

    #[test]
    fn split_rejects_unitless() {
        assert!(split_data_label("deflection").is_err());
        assert!(split_data_label(" (m)").is_err());
    }

    #[test]
    fn pretty_prints_prefixes() {
        assert_eq!(pp_si(1.5e-9, "N", Some(2)), "1.50 nN");
        assert_eq!(pp_si(2.0e3, "m", Some(0)), "2 km");
        assert_eq!(pp_si(0.0, "m", Some(1)), "0.0 m");
        assert_eq!(pp_si(-35e-9, "m", Some(1)), "-35.0 nm");
    }
}
