//! Magnitude formatting with SI suffixes for dashboards and logs.
//!
//! Values are scaled into the giga through nano range and rendered with at
//! most four characters of mantissa, so `12_323_423.2` displays as `12.3M`
//! and `0.001_232` as `1.23m`.

/// Formats the scaled value to three decimals and keeps the leading four
/// characters, dropping a dangling decimal point.
fn trim_fixed(value: f64) -> String {
    let mut fixed = format!("{:.3}", value);
    fixed.truncate(4);
    if fixed.ends_with('.') {
        fixed.pop();
    }
    fixed
}

/// Splits `value` into a short mantissa string and an SI suffix.
///
/// Suffix selection walks down from `G`: strictly above `1e9` scales by
/// giga, strictly above `1e6` by mega, then `k`, unscaled, `m`, `µ`, and
/// `n` for everything smaller. Exactly `0` renders as `("0.00", "")`, and
/// negative values are formatted without magnitude scaling since the
/// suffix ladder is defined on positive magnitudes only.
///
/// # Examples
///
/// ```
/// use unravel::units::value_and_unit;
///
/// assert_eq!(value_and_unit(123.234232e9), ("123".to_owned(), "G"));
/// assert_eq!(value_and_unit(0.0123234232), ("12.3".to_owned(), "m"));
/// ```
#[must_use]
pub fn value_and_unit(value: f64) -> (String, &'static str) {
    if value == 0.0 {
        return ("0.00".to_owned(), "");
    }
    if value < 0.0 {
        return (trim_fixed(value), "");
    }
    if value > 1e9 {
        return (trim_fixed(value / 1e9), "G");
    }
    if value > 1e6 {
        return (trim_fixed(value / 1e6), "M");
    }
    if value >= 1e3 {
        return (trim_fixed(value / 1e3), "k");
    }
    if value >= 1.0 {
        return (trim_fixed(value), "");
    }
    if value >= 1e-3 {
        return (trim_fixed(value * 1e3), "m");
    }
    if value >= 1e-6 {
        return (trim_fixed(value * 1e6), "µ");
    }
    (trim_fixed(value * 1e9), "n")
}

/// Renders `value` as a single string with its suffix attached.
#[must_use]
pub fn format_value(value: f64) -> String {
    let (number, unit) = value_and_unit(value);
    format!("{}{}", number, unit)
}
