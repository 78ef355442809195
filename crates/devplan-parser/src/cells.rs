//! Cell coercion
//!
//! Text cells are stringified and trimmed. Numeric cells keep their native
//! value; text in a numeric column is cleaned down to digits, `.` and `-`, and
//! the longest leading decimal literal is parsed. Anything unparseable is zero.

use calamine::Data;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// A coerced numeric value and whether the source text was only partially used
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coerced<T> {
    pub value: T,
    /// Cleaned text had trailing characters the number did not consume
    pub ambiguous: bool,
}

impl<T> Coerced<T> {
    fn exact(value: T) -> Self {
        Self {
            value,
            ambiguous: false,
        }
    }
}

/// Stringify a cell; empty and error cells become ""
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Is the cell blank after stringification?
pub fn is_blank(cell: Option<&Data>) -> bool {
    cell.map_or(true, |c| cell_text(c).is_empty())
}

/// Keep only digits, `.` and `-`
pub fn clean_numeric(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Longest leading decimal literal of cleaned text, normalized for parsing.
///
/// Returns `None` when the text holds no digit before the literal ends.
fn leading_literal(cleaned: &str) -> Option<(String, usize)> {
    let bytes = cleaned.as_bytes();
    let mut pos = 0;
    let negative = bytes.first() == Some(&b'-');
    if negative {
        pos += 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_digits = &cleaned[int_start..pos];

    let mut frac_digits = "";
    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut end = frac_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        frac_digits = &cleaned[frac_start..end];
        if !int_digits.is_empty() || !frac_digits.is_empty() {
            pos = end;
        }
    }

    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    let mut literal = String::with_capacity(pos + 1);
    if negative {
        literal.push('-');
    }
    literal.push_str(if int_digits.is_empty() { "0" } else { int_digits });
    if !frac_digits.is_empty() {
        literal.push('.');
        literal.push_str(frac_digits);
    }
    Some((literal, pos))
}

/// Parse cleaned numeric text into a value
fn parse_text<T: Default>(raw: &str, parse: impl Fn(&str) -> Option<T>) -> Coerced<T> {
    let cleaned = clean_numeric(raw);
    match leading_literal(&cleaned) {
        Some((literal, consumed)) => Coerced {
            value: parse(&literal).unwrap_or_default(),
            ambiguous: consumed < cleaned.len(),
        },
        None => Coerced::exact(T::default()),
    }
}

/// Coerce a cell to a float; non-numeric becomes zero
pub fn cell_number(cell: &Data) -> Coerced<f64> {
    match cell {
        Data::Float(f) if f.is_finite() => Coerced::exact(*f),
        Data::Int(i) => Coerced::exact(*i as f64),
        Data::DateTime(dt) => Coerced::exact(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            parse_text(s, |lit| lit.parse::<f64>().ok().filter(|v| v.is_finite()))
        }
        _ => Coerced::exact(0.0),
    }
}

/// Coerce a cell to a monetary amount; non-numeric becomes zero
pub fn cell_money(cell: &Data) -> Coerced<Decimal> {
    match cell {
        Data::Float(f) => Coerced::exact(Decimal::from_f64(*f).unwrap_or_default()),
        Data::Int(i) => Coerced::exact(Decimal::from(*i)),
        Data::String(s) => parse_text(s, |lit| Decimal::from_str(lit).ok()),
        _ => Coerced::exact(Decimal::ZERO),
    }
}

/// Interpret a yes/no style cell
pub fn cell_flag(cell: &Data) -> bool {
    if let Data::Bool(b) = cell {
        return *b;
    }
    matches!(
        cell_text(cell).to_lowercase().as_str(),
        "si" | "sí" | "s" | "x" | "yes" | "true" | "1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    #[test]
    fn text_is_trimmed_and_stringified() {
        assert_eq!(cell_text(&s("  Educación ")), "Educación");
        assert_eq!(cell_text(&Data::Float(12.0)), "12");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&Data::Empty)));
        assert!(is_blank(Some(&s("   "))));
        assert!(!is_blank(Some(&Data::Float(0.0))));
    }

    #[test]
    fn clean_strips_everything_but_numeric_chars() {
        assert_eq!(clean_numeric("$ 1,500.75 COP"), "1500.75");
        assert_eq!(clean_numeric("abc"), "");
        assert_eq!(clean_numeric("-3.2%"), "-3.2");
    }

    #[test]
    fn native_numbers_pass_through() {
        assert_eq!(cell_number(&Data::Float(42.5)).value, 42.5);
        assert_eq!(cell_number(&Data::Int(-3)).value, -3.0);
        assert_eq!(cell_number(&Data::Empty).value, 0.0);
        assert_eq!(cell_number(&Data::Bool(true)).value, 0.0);
    }

    #[test]
    fn text_numbers_are_cleaned() {
        let c = cell_number(&s("$ 1,500.75"));
        assert_eq!(c.value, 1500.75);
        assert!(!c.ambiguous);

        assert_eq!(cell_number(&s("  85 %")).value, 85.0);
        assert_eq!(cell_number(&s(".5")).value, 0.5);
        assert_eq!(cell_number(&s("-12")).value, -12.0);
    }

    #[test]
    fn non_numeric_text_is_zero() {
        let c = cell_number(&s("N/A"));
        assert_eq!(c.value, 0.0);
        assert!(!c.ambiguous);
        assert_eq!(cell_number(&s("-")).value, 0.0);
        assert_eq!(cell_number(&s(".")).value, 0.0);
    }

    #[test]
    fn dotted_thousands_parse_prefix_and_flag() {
        let c = cell_number(&s("1.234.567"));
        assert_eq!(c.value, 1.234);
        assert!(c.ambiguous);

        let c = cell_number(&s("2024-2027"));
        assert_eq!(c.value, 2024.0);
        assert!(c.ambiguous);
    }

    #[test]
    fn money_from_cells() {
        assert_eq!(cell_money(&Data::Float(1500000.0)).value, dec!(1500000));
        assert_eq!(cell_money(&s("$ 250,000")).value, dec!(250000));
        assert_eq!(cell_money(&s("12.")).value, dec!(12));
        assert_eq!(cell_money(&s("sin recursos")).value, Decimal::ZERO);
        assert_eq!(cell_money(&Data::Empty).value, Decimal::ZERO);
    }

    #[test]
    fn flags() {
        assert!(cell_flag(&s("SI")));
        assert!(cell_flag(&s(" Sí ")));
        assert!(cell_flag(&s("x")));
        assert!(cell_flag(&Data::Bool(true)));
        assert!(cell_flag(&Data::Float(1.0)));
        assert!(!cell_flag(&s("NO")));
        assert!(!cell_flag(&s("y")));
        assert!(!cell_flag(&Data::Empty));
    }
}
