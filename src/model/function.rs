use crate::Time;
use crate::Utility;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

/// A pure function of `(time, horizon)` used for time-dependent rewards:
/// task costs that grow as work slips, shared penalties that decay, flat
/// revenues. The textual form is canonical (tagged, `;`-separated, no
/// trailing separator) so instance files are byte-stable.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeFunction {
    /// Same value at every step.
    Constant(Utility),
    /// `a * t + b`.
    Linear { a: Utility, b: Utility },
    /// One value per time step; evaluation clamps to the last entry.
    Tabular(Vec<Utility>),
}

impl TimeFunction {
    pub const DELIM: &'static str = ";";

    pub fn eval(&self, t: Time, _horizon: Time) -> Utility {
        match self {
            Self::Constant(c) => *c,
            Self::Linear { a, b } => a * t as Utility + b,
            Self::Tabular(values) => match values.get(t) {
                Some(v) => *v,
                None => values.last().copied().unwrap_or(0.),
            },
        }
    }

    /// Copy with a scalar weight applied.
    pub fn weighted(&self, w: Utility) -> Self {
        match self {
            Self::Constant(c) => Self::Constant(c * w),
            Self::Linear { a, b } => Self::Linear { a: a * w, b: b * w },
            Self::Tabular(values) => Self::Tabular(values.iter().map(|v| v * w).collect()),
        }
    }
}

impl std::fmt::Display for TimeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(c) => write!(f, "constant{}{}", Self::DELIM, c),
            Self::Linear { a, b } => write!(f, "linear{}{}{}{}", Self::DELIM, a, Self::DELIM, b),
            Self::Tabular(values) => {
                write!(f, "tabular")?;
                for v in values {
                    write!(f, "{}{}", Self::DELIM, v)?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<&str> for TimeFunction {
    type Error = anyhow::Error;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut fields = s.trim().split(Self::DELIM);
        let tag = fields.next().unwrap_or_default();
        let values = fields
            .map(|v| v.parse::<Utility>())
            .collect::<Result<Vec<Utility>, _>>()?;
        match (tag, values.as_slice()) {
            ("constant", [c]) => Ok(Self::Constant(*c)),
            ("linear", [a, b]) => Ok(Self::Linear { a: *a, b: *b }),
            ("tabular", [_, ..]) => Ok(Self::Tabular(values)),
            _ => Err(anyhow::anyhow!("malformed time function: {}", s)),
        }
    }
}

impl Serialize for TimeFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeFunction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<TimeFunction> {
        vec![
            TimeFunction::Constant(5.),
            TimeFunction::Constant(-8.),
            TimeFunction::Linear { a: 1.5, b: -2. },
            TimeFunction::Tabular(vec![1., 2., 4., 8.]),
        ]
    }

    #[test]
    fn is_display_inverse_parse() {
        for f in samples() {
            let g = TimeFunction::try_from(f.to_string().as_str()).unwrap();
            for t in 0..12 {
                assert_eq!(f.eval(t, 12), g.eval(t, 12));
            }
        }
    }

    #[test]
    fn weighted_scales_every_step() {
        for f in samples() {
            let g = f.weighted(-2.5);
            for t in 0..12 {
                assert!((g.eval(t, 12) - f.eval(t, 12) * -2.5).abs() < crate::EPSILON);
            }
        }
    }

    #[test]
    fn tabular_clamps_to_last_entry() {
        let f = TimeFunction::Tabular(vec![1., 2., 3.]);
        assert_eq!(f.eval(7, 8), 3.);
    }

    #[test]
    fn rejects_malformed() {
        for s in ["", "constant", "linear;1", "gaussian;0;1", "tabular"] {
            assert!(TimeFunction::try_from(s).is_err());
        }
    }
}
