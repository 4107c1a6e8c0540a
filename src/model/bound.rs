use super::value::Value;
use crate::Probability;

/// An immutable envelope `(lower, upper)` on the remaining cumulative reward
/// obtainable from a state. `update` tightens over alternative choices,
/// `add` sums over sequential or parallel segments.
#[derive(Clone, Debug, PartialEq)]
pub struct Bound {
    lower: Value,
    upper: Value,
}

impl Bound {
    /// The additive identity: a zero-width envelope at the origin.
    pub fn empty(n: usize) -> Self {
        Self {
            lower: Value::zero(n),
            upper: Value::zero(n),
        }
    }

    /// A zero-width envelope at `v`.
    pub fn point(v: Value) -> Self {
        Self {
            lower: v.clone(),
            upper: v,
        }
    }

    pub fn lower(&self) -> &Value {
        &self.lower
    }
    pub fn upper(&self) -> &Value {
        &self.upper
    }

    /// Is this envelope exact?
    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    /// Envelope over alternatives: `(min(L, L'), max(U, U'))` componentwise.
    pub fn update(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(&other.lower),
            upper: self.upper.max(&other.upper),
        }
    }

    /// Sum of segments: `(L + L', U + U')` componentwise.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.add(&other.lower),
            upper: self.upper.add(&other.upper),
        }
    }

    pub fn scale(&self, p: Probability) -> Self {
        Self {
            lower: self.lower.scale(p),
            upper: self.upper.scale(p),
        }
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(l: f64, u: f64) -> Bound {
        Bound {
            lower: Value::new(vec![l]),
            upper: Value::new(vec![u]),
        }
    }

    #[test]
    fn update_is_exact_min_max() {
        let x = b(1., 4.);
        let y = b(-2., 3.);
        let z = x.update(&y);
        assert_eq!(z.lower(), &Value::new(vec![-2.]));
        assert_eq!(z.upper(), &Value::new(vec![4.]));
    }

    #[test]
    fn add_is_associative_and_commutative() {
        let (x, y, z) = (b(1., 2.), b(-1., 5.), b(0.5, 0.5));
        assert_eq!(x.add(&y), y.add(&x));
        assert_eq!(x.add(&y).add(&z), x.add(&y.add(&z)));
    }

    #[test]
    fn empty_is_additive_identity() {
        let x = b(-3., 7.);
        assert_eq!(x.add(&Bound::empty(1)), x);
    }

    #[test]
    fn point_is_zero_width() {
        assert!(Bound::point(Value::new(vec![2., 3.])).is_point());
        assert!(!b(0., 1.).is_point());
    }
}
