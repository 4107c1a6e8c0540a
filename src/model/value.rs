use crate::Probability;
use crate::Utility;

/// The named numeric objectives a domain optimizes over, e.g. revenue, cost,
/// network reward. Positions are fixed at construction; every `Value` in a
/// solve has exactly this arity. Scalarization applies the weights.
#[derive(Clone, Debug, PartialEq)]
pub struct Objectives {
    names: Vec<String>,
    weights: Vec<Utility>,
}

impl Objectives {
    pub fn new(names: Vec<String>, weights: Vec<Utility>) -> Self {
        assert!(names.len() == weights.len());
        Self { names, weights }
    }

    /// Unit weights over the given names.
    pub fn uniform(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            weights: vec![1.; names.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn zero(&self) -> Value {
        Value::zero(self.len())
    }

    /// Weighted total of a value vector; the only place a `Value` collapses
    /// into a comparable scalar.
    pub fn total(&self, value: &Value) -> Utility {
        self.weights
            .iter()
            .zip(value.components())
            .map(|(w, v)| w * v)
            .sum()
    }
}

/// A vector-valued reward. All reward arithmetic in the solver stays
/// vectorial; comparison is deferred to `Objectives::total`.
#[derive(Clone, Debug, PartialEq)]
pub struct Value(Vec<Utility>);

impl Value {
    pub fn zero(n: usize) -> Self {
        Self(vec![0.; n])
    }
    pub fn new(components: Vec<Utility>) -> Self {
        Self(components)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn components(&self) -> &[Utility] {
        &self.0
    }
    pub fn get(&self, i: usize) -> Utility {
        self.0[i]
    }
    pub fn set(&mut self, i: usize, v: Utility) {
        self.0[i] = v;
    }
    pub fn accrue(&mut self, i: usize, v: Utility) {
        self.0[i] += v;
    }

    pub fn add(&self, other: &Self) -> Self {
        assert!(self.len() == other.len());
        Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a + b)
                .collect(),
        )
    }

    pub fn scale(&self, p: Probability) -> Self {
        Self(self.0.iter().map(|v| v * p).collect())
    }

    pub fn min(&self, other: &Self) -> Self {
        assert!(self.len() == other.len());
        Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a.min(*b))
                .collect(),
        )
    }

    pub fn max(&self, other: &Self) -> Self {
        assert!(self.len() == other.len());
        Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a.max(*b))
                .collect(),
        )
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            match i {
                0 => write!(f, "{:.4}", v)?,
                _ => write!(f, ", {:.4}", v)?,
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_scale_are_componentwise() {
        let a = Value::new(vec![1., -2., 3.]);
        let b = Value::new(vec![0.5, 0.5, 0.5]);
        assert_eq!(a.add(&b), Value::new(vec![1.5, -1.5, 3.5]));
        assert_eq!(a.scale(2.), Value::new(vec![2., -4., 6.]));
    }

    #[test]
    fn total_applies_weights() {
        let objectives = Objectives::new(
            vec!["gain".into(), "loss".into()],
            vec![1., 2.],
        );
        assert_eq!(objectives.total(&Value::new(vec![3., -1.])), 1.);
    }
}
