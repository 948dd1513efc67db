/// Decimal places used for every displayed or exported area value.
pub const DISPLAY_PLACES: usize = 4;

/// Absolute tolerance for comparing values that went through different summation orders.
pub const AREA_TOLERANCE: f64 = 1e-9;

/// Rounds half away from zero. Magnitudes too large to scale are returned unchanged.
pub fn round_to(value: f64, places: usize) -> f64 {
    let factor = 10f64.powi(places as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Formats a number the pt-BR way: `.` groups thousands and `,` separates decimals.
///
/// # Examples
/// - `1234567.891` with 2 places -> `1.234.567,89`
/// - `-0.5` with 4 places -> `-0,5000`
pub fn format_br(value: f64, places: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.*}", places, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    // Rounded-away magnitudes should not print as "-0,0000"
    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    match frac_part {
        Some(frac) => format!("{}{},{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// Shorthand for [`format_br`] at [`DISPLAY_PLACES`].
pub fn br(value: f64) -> String {
    format_br(value, DISPLAY_PLACES)
}
