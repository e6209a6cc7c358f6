//! Transform codec: affine transforms to and from `transform` attribute text.
//!
//! Output is locale independent: `.` decimal separator, shortest decimal
//! that parses back to the same `f64`.

use kurbo::{Affine, Point};
use thiserror::Error;

/// Transform parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Malformed transform `{0}`")]
    Malformed(String),
}

/// Values closer than this to an integer are written as that integer.
const SNAP_EPSILON: f64 = 1e-9;
/// Relative tolerance under which a matrix counts as shear free.
const SHEAR_EPSILON: f64 = 1e-9;

/// Format a number for an attribute value.
pub fn format_number(value: f64) -> String {
    let rounded = value.round();
    let value = if (value - rounded).abs() < SNAP_EPSILON { rounded } else { value };
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// Encode a transform as `translate(...) rotate(...) scale(...)`, falling
/// back to `matrix(...)` when the matrix shears. Identity encodes as `""`.
pub fn encode(transform: Affine) -> String {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    if transform == Affine::IDENTITY {
        return String::new();
    }

    let sx = a.hypot(b);
    if sx == 0.0 || !sx.is_finite() {
        return encode_matrix(transform);
    }
    let sy = (a * d - b * c) / sx;
    let shear = a * c + b * d;
    if shear.abs() > SHEAR_EPSILON * (sx * sy).abs().max(1.0) {
        return encode_matrix(transform);
    }

    let mut parts = Vec::new();
    if e != 0.0 || f != 0.0 {
        parts.push(format!("translate({}, {})", format_number(e), format_number(f)));
    }
    let degrees = b.atan2(a).to_degrees();
    let degrees_text = format_number(degrees);
    if degrees_text != "0" {
        parts.push(format!("rotate({})", degrees_text));
    }
    let (sx_text, sy_text) = (format_number(sx), format_number(sy));
    if sx_text != "1" || sy_text != "1" {
        if sx_text == sy_text {
            parts.push(format!("scale({})", sx_text));
        } else {
            parts.push(format!("scale({}, {})", sx_text, sy_text));
        }
    }
    parts.join(" ")
}

fn encode_matrix(transform: Affine) -> String {
    let coeffs: Vec<String> = transform.as_coeffs().iter().map(|v| format_number(*v)).collect();
    format!("matrix({})", coeffs.join(", "))
}

/// Decode an SVG transform list. Empty text decodes to the identity.
pub fn decode(text: &str) -> Result<Affine, TransformError> {
    let malformed = || TransformError::Malformed(text.to_string());
    let mut result = Affine::IDENTITY;
    let mut rest = text.trim_start_matches(is_separator);

    while !rest.is_empty() {
        let name_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .ok_or_else(malformed)?;
        let (name, after) = rest.split_at(name_len);
        let after = after.trim_start();
        let args_text = after.strip_prefix('(').ok_or_else(malformed)?;
        let close = args_text.find(')').ok_or_else(malformed)?;
        let args = parse_numbers(&args_text[..close]).ok_or_else(malformed)?;

        result *= component(name, &args).ok_or_else(malformed)?;
        rest = args_text[close + 1..].trim_start_matches(is_separator);
    }

    Ok(result)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

fn component(name: &str, args: &[f64]) -> Option<Affine> {
    let arg = |i: usize| args.get(i).copied();
    match (name, args.len()) {
        ("matrix", 6) => Some(Affine::new([args[0], args[1], args[2], args[3], args[4], args[5]])),
        ("translate", 1 | 2) => Some(Affine::translate((args[0], arg(1).unwrap_or(0.0)))),
        ("scale", 1 | 2) => Some(Affine::scale_non_uniform(args[0], arg(1).unwrap_or(args[0]))),
        ("rotate", 1) => Some(Affine::rotate(args[0].to_radians())),
        ("rotate", 3) => {
            let center = (args[1], args[2]);
            Some(
                Affine::translate(center)
                    * Affine::rotate(args[0].to_radians())
                    * Affine::translate((-args[1], -args[2])),
            )
        }
        ("skewX", 1) => Some(Affine::new([1.0, 0.0, args[0].to_radians().tan(), 1.0, 0.0, 0.0])),
        ("skewY", 1) => Some(Affine::new([1.0, args[0].to_radians().tan(), 0.0, 1.0, 0.0, 0.0])),
        _ => None,
    }
}

/// Parse a whitespace/comma separated list of numbers.
pub fn parse_numbers(text: &str) -> Option<Vec<f64>> {
    text.split(is_separator)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

/// Encode points as `x,y x,y ...`.
pub fn encode_points(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", format_number(p.x), format_number(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a `points` attribute. Fails on non-numeric tokens or an odd count.
pub fn decode_points(text: &str) -> Option<Vec<Point>> {
    let numbers = parse_numbers(text)?;
    if numbers.len() % 2 != 0 {
        return None;
    }
    Some(numbers.chunks_exact(2).map(|xy| Point::new(xy[0], xy[1])).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Affine, b: Affine) {
        for (x, y) in a.as_coeffs().iter().zip(b.as_coeffs().iter()) {
            assert!((x - y).abs() <= 1e-6 * x.abs().max(1.0), "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_identity_is_empty() {
        assert_eq!(encode(Affine::IDENTITY), "");
        assert_eq!(decode("").unwrap(), Affine::IDENTITY);
        assert_eq!(decode("   ").unwrap(), Affine::IDENTITY);
    }

    #[test]
    fn test_component_form() {
        let t = Affine::translate((10.0, 20.5)) * Affine::rotate(90f64.to_radians()) * Affine::scale(2.0);
        assert_eq!(encode(t), "translate(10, 20.5) rotate(90) scale(2)");

        let mirror = Affine::scale_non_uniform(1.0, -1.0);
        assert_eq!(encode(mirror), "scale(1, -1)");
    }

    #[test]
    fn test_sheared_matrix_falls_back() {
        let t = Affine::new([1.0, 0.0, 0.5, 1.0, 3.0, 4.0]);
        assert_eq!(encode(t), "matrix(1, 0, 0.5, 1, 3, 4)");
        assert_close(decode(&encode(t)).unwrap(), t);
    }

    #[test]
    fn test_inverse_law() {
        let transforms = [
            Affine::translate((-12.25, 7.0)),
            Affine::rotate(0.3) * Affine::scale_non_uniform(1.5, 0.25),
            Affine::translate((100.0, -3.5)) * Affine::rotate(-2.0) * Affine::scale_non_uniform(-2.0, 3.0),
            Affine::new([0.0, 0.0, 1.0, 1.0, 5.0, 5.0]),
            Affine::new([1e-7, 2.0, -3.0, 4.5, 1e6, -1e6]),
        ];
        for t in transforms {
            assert_close(decode(&encode(t)).unwrap(), t);
        }
    }

    #[test]
    fn test_decode_tolerant_grammar() {
        let t = decode("  translate(5)  scale( 2 ,3 ),rotate(1e1)").unwrap();
        let expected = Affine::translate((5.0, 0.0))
            * Affine::scale_non_uniform(2.0, 3.0)
            * Affine::rotate(10f64.to_radians());
        assert_close(t, expected);

        let around = decode("rotate(180 10 10)").unwrap();
        assert_close(around, Affine::new([-1.0, 0.0, 0.0, -1.0, 20.0, 20.0]));
        assert_close(decode("scale(+2E-1)").unwrap(), Affine::scale(0.2));
    }

    #[test]
    fn test_decode_malformed() {
        assert!(decode("translate(a, b)").is_err());
        assert!(decode("translate(1, 2").is_err());
        assert!(decode("bogus(1)").is_err());
        assert!(decode("matrix(1 2 3)").is_err());
    }

    #[test]
    fn test_number_format() {
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.0000000000001), "2");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-1234.5), "-1234.5");
    }

    #[test]
    fn test_points() {
        let points = vec![Point::new(1.0, 2.5), Point::new(-3.0, 0.0)];
        assert_eq!(encode_points(&points), "1,2.5 -3,0");
        assert_eq!(decode_points("1,2.5 -3,0").unwrap(), points);
        assert_eq!(decode_points("").unwrap(), Vec::<Point>::new());
        assert!(decode_points("1,2 3").is_none());
        assert!(decode_points("1,x").is_none());
    }
}
