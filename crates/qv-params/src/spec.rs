//! Parser for single parameter specifications.

use qv_types::ParameterError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Deviation used for `~value` specs, as a fraction of |mean|.
pub const DEFAULT_STD_FACTOR: f64 = 0.1;
/// Lower clamp for the default deviation.
pub const DEFAULT_STD_MINIMUM: f64 = 0.01;
pub const DEFAULT_LOWER_BOUND: f64 = -1e12;
pub const DEFAULT_UPPER_BOUND: f64 = 1e12;

/// Deviation assumed when a spec names a mean but no deviation.
pub fn default_std(mean: f64) -> f64 {
    (DEFAULT_STD_FACTOR * mean.abs()).max(DEFAULT_STD_MINIMUM)
}

/// A free parameter's initial distribution and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreePar {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Result of parsing one parameter specification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParValue {
    /// Fixed value; not part of the search space.
    Fixed(f64),
    /// Free parameter to be optimized.
    Free(FreePar),
}

impl ParValue {
    /// Parse the textual form, e.g. `"0~0.2[0,1]"`.
    pub fn parse(name: &str, text: &str) -> Result<Self, ParameterError> {
        let mut raw = RawSpec::default();
        let mut cursor = Cursor::new(name, text);

        loop {
            cursor.skip_whitespace();
            let Some(c) = cursor.peek() else { break };
            match c {
                '~' => {
                    if raw.std.is_some() {
                        return Err(ParameterError::StdAlreadyDefined {
                            name: name.to_string(),
                        });
                    }
                    cursor.bump();
                    raw.std = Some(cursor.number()?);
                }
                '[' | '<' | '(' => {
                    cursor.bump();
                    raw.min = Some(cursor.number()?);
                    cursor.skip_whitespace();
                    if cursor.bump() != Some(',') {
                        return Err(ParameterError::ExpectedComma {
                            name: name.to_string(),
                        });
                    }
                    raw.max = Some(cursor.number()?);
                    cursor.skip_whitespace();
                    let close = cursor.bump();
                    if close != Some(closing_bracket(c)) {
                        return Err(ParameterError::BracketMismatch {
                            name: name.to_string(),
                            open: c,
                            close: close.map_or_else(|| "end of input".to_string(), String::from),
                        });
                    }
                }
                _ => {
                    if raw.mean.is_some() {
                        return Err(ParameterError::MeanAlreadyDefined {
                            name: name.to_string(),
                        });
                    }
                    raw.mean = Some(cursor.number()?);
                }
            }
        }

        raw.resolve(name)
    }

    /// Interpret a JSON value: numbers are fixed, strings use the textual
    /// form, objects carry `mean` / `std` / `min` / `max` / `is_free` keys.
    pub fn from_json(name: &str, value: &Value) -> Result<Self, ParameterError> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(ParValue::Fixed)
                .ok_or_else(|| invalid_number(name, value)),
            Value::String(s) => Self::parse(name, s),
            Value::Object(map) => {
                let field = |keys: &[&str]| -> Result<Option<f64>, ParameterError> {
                    match keys.iter().find_map(|k| map.get(*k)) {
                        None => Ok(None),
                        Some(v) => v.as_f64().map(Some).ok_or_else(|| invalid_number(name, v)),
                    }
                };

                let is_free = map.get("is_free").and_then(Value::as_bool).unwrap_or(true);
                let mean = field(&["mean", "init_mean"])?;
                if !is_free {
                    return mean.map(ParValue::Fixed).ok_or_else(|| ParameterError::NothingDefined {
                        name: name.to_string(),
                    });
                }

                let std = field(&["std", "init_std"])?;
                let (min, max) = (field(&["min"])?, field(&["max"])?);
                if mean.is_none() && std.is_none() && min.is_none() && max.is_none() {
                    return Err(ParameterError::NothingDefined {
                        name: name.to_string(),
                    });
                }

                // object nodes always carry bounds, so a free mean needs a std
                RawSpec {
                    mean,
                    std,
                    min: Some(min.unwrap_or(DEFAULT_LOWER_BOUND)),
                    max: Some(max.unwrap_or(DEFAULT_UPPER_BOUND)),
                }
                .resolve(name)
            }
            _ => Err(invalid_number(name, value)),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, ParValue::Free(_))
    }

    /// The fixed value, or the mean of a free parameter.
    pub fn mean(&self) -> f64 {
        match self {
            ParValue::Fixed(v) => *v,
            ParValue::Free(p) => p.mean,
        }
    }
}

fn invalid_number(name: &str, value: &Value) -> ParameterError {
    ParameterError::InvalidNumber {
        name: name.to_string(),
        token: value.to_string(),
    }
}

fn closing_bracket(open: char) -> char {
    match open {
        '[' => ']',
        '<' => '>',
        _ => ')',
    }
}

#[derive(Debug, Default)]
struct RawSpec {
    mean: Option<f64>,
    std: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl RawSpec {
    fn resolve(self, name: &str) -> Result<ParValue, ParameterError> {
        let RawSpec {
            mean,
            std,
            min,
            max,
        } = self;

        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ParameterError::MinGreaterThanMax {
                    name: name.to_string(),
                });
            }
        }
        if mean.is_none() && std.is_none() && min.is_none() && max.is_none() {
            return Err(ParameterError::NothingDefined {
                name: name.to_string(),
            });
        }
        if std.is_none() && (min.is_some() || max.is_some()) {
            return Err(ParameterError::BoundsWithoutStd {
                name: name.to_string(),
            });
        }

        let (mean, std) = match (mean, std) {
            (Some(m), None) => return Ok(ParValue::Fixed(m)),
            // `~value` notation: the value is the mean, deviation is defaulted
            (None, Some(v)) => (v, default_std(v)),
            (Some(m), Some(s)) => (m, s),
            (None, None) => {
                return Err(ParameterError::NothingDefined {
                    name: name.to_string(),
                })
            }
        };

        Ok(ParValue::Free(FreePar {
            mean,
            std,
            min: min.unwrap_or(DEFAULT_LOWER_BOUND),
            max: max.unwrap_or(DEFAULT_UPPER_BOUND),
        }))
    }
}

struct Cursor<'a> {
    name: &'a str,
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(name: &'a str, text: &'a str) -> Self {
        Self { name, text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn number(&mut self) -> Result<f64, ParameterError> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !"~[]<>(),".contains(c))
        {
            self.bump();
        }

        let token = if self.pos > start {
            &self.text[start..self.pos]
        } else {
            // report the offending delimiter (or nothing at end of input)
            let end = self.peek().map_or(start, |c| start + c.len_utf8());
            &self.text[start..end]
        };
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(ParameterError::InvalidNumber {
                name: self.name.to_string(),
                token: token.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn free(mean: f64, std: f64, min: f64, max: f64) -> ParValue {
        ParValue::Free(FreePar { mean, std, min, max })
    }

    #[test]
    fn bare_value_is_fixed() {
        assert_eq!(ParValue::parse("x", "1.5"), Ok(ParValue::Fixed(1.5)));
        assert_eq!(ParValue::parse("x", " -2e3 "), Ok(ParValue::Fixed(-2000.0)));
    }

    #[test]
    fn mean_std_uses_default_bounds() {
        assert_eq!(
            ParValue::parse("x", "2~0.3"),
            Ok(free(2.0, 0.3, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND))
        );
    }

    #[test]
    fn all_bracket_styles() {
        let expected = free(0.0, 0.2, 0.0, 1.0);
        assert_eq!(ParValue::parse("x", "0~0.2[0,1]"), Ok(expected));
        assert_eq!(ParValue::parse("x", "0~0.2<0,1>"), Ok(expected));
        assert_eq!(ParValue::parse("x", "0~0.2(0,1)"), Ok(expected));
        assert_eq!(ParValue::parse("x", "0 ~ 0.2 [ 0 , 1 ]"), Ok(expected));
    }

    #[test]
    fn tilde_value_becomes_mean_with_default_std() {
        assert_eq!(
            ParValue::parse("x", "~0.5"),
            Ok(free(0.5, 0.05, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND))
        );
        // small means hit the deviation floor
        match ParValue::parse("x", "~0.01") {
            Ok(ParValue::Free(p)) => assert_eq!(p.std, DEFAULT_STD_MINIMUM),
            other => panic!("unexpected: {other:?}"),
        }
        match ParValue::parse("x", "~-40[-100,0]") {
            Ok(ParValue::Free(p)) => {
                assert_eq!(p.mean, -40.0);
                assert!((p.std - 4.0).abs() < 1e-12);
                assert_eq!((p.min, p.max), (-100.0, 0.0));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mismatched_brackets_are_rejected() {
        assert_eq!(
            ParValue::parse("knee", "0~0.1[1,2)"),
            Err(ParameterError::BracketMismatch {
                name: "knee".into(),
                open: '[',
                close: ")".into()
            })
        );
        assert!(ParValue::parse("knee", "1,2)").is_err());
        assert!(matches!(
            ParValue::parse("knee", "0~0.1<1,2"),
            Err(ParameterError::BracketMismatch { .. })
        ));
    }

    #[test]
    fn invalid_combinations() {
        assert!(matches!(
            ParValue::parse("p", "0~0.1[2,1]"),
            Err(ParameterError::MinGreaterThanMax { .. })
        ));
        assert!(matches!(
            ParValue::parse("p", "1[0,2]"),
            Err(ParameterError::BoundsWithoutStd { .. })
        ));
        assert!(matches!(
            ParValue::parse("p", "[0,2]"),
            Err(ParameterError::BoundsWithoutStd { .. })
        ));
        assert!(matches!(ParValue::parse("p", ""), Err(ParameterError::NothingDefined { .. })));
        assert!(matches!(
            ParValue::parse("p", "1 2"),
            Err(ParameterError::MeanAlreadyDefined { .. })
        ));
        assert!(matches!(
            ParValue::parse("p", "1~2~3"),
            Err(ParameterError::StdAlreadyDefined { .. })
        ));
        assert!(matches!(
            ParValue::parse("p", "0~1[0;1]"),
            Err(ParameterError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for text in ["0~1[nan,1]", "inf~1", "0~NaN", "0~1(-inf,infinity)"] {
            assert!(
                matches!(ParValue::parse("p", text), Err(ParameterError::InvalidNumber { .. })),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn error_names_the_parameter() {
        let err = ParValue::parse("ankle.stiffness", "0~0.1[3,1]").unwrap_err();
        assert_eq!(err.name(), "ankle.stiffness");
        assert!(err.to_string().contains("min > max"));
    }

    #[test]
    fn json_forms() {
        assert_eq!(ParValue::from_json("a", &json!(3.0)), Ok(ParValue::Fixed(3.0)));
        assert_eq!(
            ParValue::from_json("a", &json!("1~0.5[0,2]")),
            Ok(free(1.0, 0.5, 0.0, 2.0))
        );
        assert_eq!(
            ParValue::from_json("a", &json!({ "init_mean": 1.0, "init_std": 0.1, "min": 0.0 })),
            Ok(free(1.0, 0.1, 0.0, DEFAULT_UPPER_BOUND))
        );
        assert_eq!(
            ParValue::from_json("a", &json!({ "mean": 4.0, "std": 1.0, "is_free": false })),
            Ok(ParValue::Fixed(4.0))
        );
        assert!(matches!(
            ParValue::from_json("a", &json!({ "mean": 2.0 })),
            Err(ParameterError::BoundsWithoutStd { .. })
        ));
        assert_eq!(
            ParValue::from_json("a", &json!({ "std": 0.5 })),
            Ok(free(0.5, default_std(0.5), DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND))
        );
        assert!(matches!(
            ParValue::from_json("a", &json!({})),
            Err(ParameterError::NothingDefined { .. })
        ));
        assert!(ParValue::from_json("a", &json!({ "mean": "x" })).is_err());
        assert!(ParValue::from_json("a", &json!(true)).is_err());
    }
}
