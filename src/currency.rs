//! Integer-cent money helpers. No floating-point amount crosses this module's
//! boundary except `dollars_to_cents`, which exists for callers that parse
//! user-entered decimal amounts.

const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("usd", "$"),
    ("eur", "€"),
    ("gbp", "£"),
    ("cad", "CA$"),
    ("aud", "A$"),
];

pub fn currency_symbol(currency: &str) -> String {
    let code = currency.trim();
    CURRENCY_SYMBOLS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, symbol)| symbol.to_string())
        .unwrap_or_else(|| code.to_ascii_uppercase())
}

/// `150075, "usd"` -> `"$1,500.75"`; `-500, "usd"` -> `"-$5.00"`.
pub fn format_currency(cents: i64, currency: &str) -> String {
    let symbol = currency_symbol(currency);
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!(
        "{sign}{symbol}{}.{:02}",
        group_thousands(abs / 100),
        abs % 100
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn line_total_cents(quantity: i64, unit_amount_cents: i64) -> i64 {
    quantity.saturating_mul(unit_amount_cents)
}

pub fn subtotal_cents<I>(items: I) -> i64
where
    I: IntoIterator<Item = (i64, i64)>,
{
    items
        .into_iter()
        .map(|(quantity, unit)| line_total_cents(quantity, unit))
        .fold(0i64, i64::saturating_add)
}

/// Rounds half away from zero to the nearest cent.
pub fn dollars_to_cents(dollars: f64) -> i64 {
    if !dollars.is_finite() {
        return 0;
    }
    (dollars * 100.0).round() as i64
}

/// Percent expressed in basis points (4.4% -> 440).
pub fn percent_to_basis_points(percent: f64) -> i64 {
    if !percent.is_finite() {
        return 0;
    }
    (percent * 100.0).round() as i64
}

/// `base * percent / 100`, rounded to the nearest cent in integer arithmetic.
pub fn percent_of_cents(base_cents: i64, percent: f64) -> i64 {
    let bps = percent_to_basis_points(percent) as i128;
    let product = (base_cents as i128) * bps;
    let rounded = crate::types::div_round_i128(product, 10_000);
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Formats a percentage without trailing zeros: 4.40 -> "4.4", 3.0 -> "3".
pub fn format_percent(percent: f64) -> String {
    let bps = percent_to_basis_points(percent);
    let sign = if bps < 0 { "-" } else { "" };
    let abs = bps.unsigned_abs();
    let whole = abs / 100;
    let frac = abs % 100;
    if frac == 0 {
        format!("{sign}{whole}")
    } else if frac % 10 == 0 {
        format!("{sign}{whole}.{}", frac / 10)
    } else {
        format!("{sign}{whole}.{frac:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_symbol_and_thousands_separators() {
        assert_eq!(format_currency(150075, "usd"), "$1,500.75");
        assert_eq!(format_currency(500000, "usd"), "$5,000.00");
        assert_eq!(format_currency(123456789, "EUR"), "€1,234,567.89");
        assert_eq!(format_currency(0, "gbp"), "£0.00");
        assert_eq!(format_currency(99, "cad"), "CA$0.99");
    }

    #[test]
    fn negative_amounts_lead_with_minus() {
        assert_eq!(format_currency(-500, "usd"), "-$5.00");
        assert_eq!(format_currency(-123456, "aud"), "-A$1,234.56");
    }

    #[test]
    fn unmapped_codes_become_their_own_symbol() {
        assert_eq!(format_currency(100, "xyz"), "XYZ1.00");
        assert_eq!(currency_symbol("chf"), "CHF");
    }

    #[test]
    fn line_math_is_integer_only() {
        assert_eq!(line_total_cents(3, 2500), 7500);
        assert_eq!(subtotal_cents([(1, 100), (2, 250)]), 600);
        assert_eq!(line_total_cents(i64::MAX, 2), i64::MAX);
    }

    #[test]
    fn dollars_round_to_nearest_cent() {
        assert_eq!(dollars_to_cents(5000.0), 500000);
        assert_eq!(dollars_to_cents(19.999), 2000);
        assert_eq!(dollars_to_cents(f64::NAN), 0);
    }

    #[test]
    fn percentages_use_basis_points() {
        assert_eq!(percent_of_cents(250000, 4.4), 11000);
        assert_eq!(percent_of_cents(333, 2.5), 8);
        assert_eq!(format_percent(4.4), "4.4");
        assert_eq!(format_percent(3.0), "3");
        assert_eq!(format_percent(2.75), "2.75");
    }
}
