//! Number formatting for progress lines.
//!
//! Values are rendered either as plain integers or, when an order scale is set, as a
//! three-significant-digit mantissa followed by a metric prefix (`1.50kB`, `12.3MB/s`).
//! None of these functions fail: missing or unknown inputs degrade to shorter strings.

use compact_str::{CompactString, format_compact};

/// Metric prefixes for magnitude tiers `-5..=5`.
const PREFIXES: [&str; 11] = ["f", "p", "n", "u", "m", "", "k", "M", "G", "T", "P"];

/// How a counter's values are presented.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayFormat {
    /// Show `value / total` as a percentage when the total is known.
    pub use_percent: bool,
    /// The counter only ever holds whole numbers.
    pub is_integral: bool,
    /// Base for magnitude prefixes (`1000.0`, `1024.0`), or `0.0` for none.
    pub order_scale: f64,
    /// Unit appended after the prefix.
    pub suffix: CompactString,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            use_percent: false,
            is_integral: true,
            order_scale: 0.0,
            suffix: CompactString::default(),
        }
    }
}

impl DisplayFormat {
    /// Byte counts: base 1024 with a `B` suffix.
    #[must_use]
    pub fn bytes() -> Self {
        Self {
            order_scale: 1024.0,
            suffix: CompactString::const_new("B"),
            ..Self::default()
        }
    }

    /// Formats a single value with this format's scale and suffix.
    #[must_use]
    pub fn value(&self, value: f64) -> CompactString {
        format_value(value, self.order_scale, &self.suffix, self.is_integral)
    }

    /// Formats a rate. Rates are never integral.
    #[must_use]
    pub fn rate(&self, rate: f64) -> CompactString {
        format_value(rate, self.order_scale, &self.suffix, false)
    }

    /// Formats the counter: a percentage if enabled and possible, else the fraction.
    #[must_use]
    pub fn progress(&self, value: i64, total: i64) -> CompactString {
        if self.use_percent {
            if let Some(percent) = format_percent(value, total) {
                return percent;
            }
        }
        format_fraction(value, total, self)
    }
}

/// Formats `value` with an optional magnitude prefix and a unit suffix.
///
/// With no usable `order_scale` (`0`, or any base `<= 1`) or `value == 0` the value
/// is rounded to a plain integer.
/// Otherwise the largest tier `k` in `-5..=5` with `|value| / order_scale^k >= 1`
/// is chosen and the mantissa printed to three significant digits. Integral values
/// below the first positive tier are never given fractional digits.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
#[must_use]
pub fn format_value(
    value: f64,
    order_scale: f64,
    suffix: &str,
    is_integral: bool,
) -> CompactString {
    if !value.is_finite() {
        return format_compact!("?{suffix}");
    }
    if order_scale <= 1.0 || value == 0.0 {
        return format_compact!("{}{suffix}", value.round() as i64);
    }

    let magnitude = value.abs();
    let mut tier = (-5i32..=5)
        .rev()
        .find(|&k| magnitude / order_scale.powi(k) >= 1.0)
        .unwrap_or(-5);

    if is_integral && tier <= 0 {
        return format_compact!("{}{suffix}", value.round() as i64);
    }

    let mut mantissa = value / order_scale.powi(tier);
    let mut precision = decimals_for(round_to(mantissa, decimals_for(mantissa)));

    // Rounding can carry into the next tier (999.7 -> 1.00k).
    if round_to(mantissa, precision).abs() >= order_scale && tier < 5 {
        tier += 1;
        mantissa = value / order_scale.powi(tier);
        precision = decimals_for(round_to(mantissa, decimals_for(mantissa)));
    }

    let prefix = PREFIXES[(tier + 5) as usize];
    format_compact!("{mantissa:.precision$}{prefix}{suffix}")
}

/// Fractional digits that give three significant digits for `mantissa`.
fn decimals_for(mantissa: f64) -> usize {
    match mantissa.abs() {
        m if m >= 100.0 => 0,
        m if m >= 10.0 => 1,
        _ => 2,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn round_to(value: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Formats `value * 100 / total` to two decimals with a `%` suffix.
///
/// Returns `None` when the total is not positive or the value is unknown, in which
/// case callers fall back to [`format_fraction`].
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_percent(value: i64, total: i64) -> Option<CompactString> {
    if total <= 0 || value < 0 {
        return None;
    }
    let percent = value as f64 * 100.0 / total as f64;
    Some(format_compact!("{percent:.2}%"))
}

/// Formats `value/total`, dropping whichever side is unknown (negative).
///
/// Both unknown yields an empty string.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_fraction(value: i64, total: i64, format: &DisplayFormat) -> CompactString {
    match (value >= 0, total >= 0) {
        (true, true) => format_compact!(
            "{}/{}",
            format.value(value as f64),
            format.value(total as f64)
        ),
        (false, true) => format.value(total as f64),
        (true, false) => format.value(value as f64),
        (false, false) => CompactString::default(),
    }
}
