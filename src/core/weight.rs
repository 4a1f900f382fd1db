//! Exact rational chain weight and the fork-choice rule
//!
//! Weight is a reduced fraction of two arbitrary-precision integers. Every
//! node must order tipsets identically, so nothing in here touches floating
//! point. Denominators grow with the product of the distinct total powers a
//! chain has seen, so the parts are never narrowed to a fixed width.

use super::{TipSet, TipSetKey};
use crate::{Error, Result};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Accumulated chain weight as `numerator / denominator`
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWeight", into = "RawWeight")]
pub struct Weight {
    num: BigUint,
    den: BigUint,
}

/// Wire form: both parts as decimal strings
#[derive(Serialize, Deserialize)]
struct RawWeight {
    numerator: String,
    denominator: String,
}

impl TryFrom<RawWeight> for Weight {
    type Error = Error;

    fn try_from(raw: RawWeight) -> Result<Self> {
        let parse = |part: &str| {
            BigUint::from_str(part).map_err(|e| Error::weight(format!("invalid weight part {:?}: {}", part, e)))
        };
        Weight::from_ratio(parse(&raw.numerator)?, parse(&raw.denominator)?)
    }
}

impl From<Weight> for RawWeight {
    fn from(w: Weight) -> Self {
        RawWeight {
            numerator: w.num.to_str_radix(10),
            denominator: w.den.to_str_radix(10),
        }
    }
}

fn gcd(mut a: BigUint, mut b: BigUint) -> BigUint {
    while !b.is_zero() {
        let t = &a % &b;
        a = b;
        b = t;
    }
    a
}

impl Weight {
    /// Create a weight, reducing the fraction
    pub fn new(numerator: u64, denominator: u64) -> Result<Self> {
        Self::from_ratio(numerator, denominator)
    }

    /// Zero weight (`0/1`), the weight of genesis
    pub fn zero() -> Self {
        Self {
            num: BigUint::zero(),
            den: BigUint::one(),
        }
    }

    /// Whole-number weight
    pub fn from_integer(value: u64) -> Self {
        Self {
            num: BigUint::from(value),
            den: BigUint::one(),
        }
    }

    /// Reduce `numerator / denominator` into a weight
    pub fn from_ratio(numerator: impl Into<BigUint>, denominator: impl Into<BigUint>) -> Result<Self> {
        let numerator: BigUint = numerator.into();
        let denominator: BigUint = denominator.into();
        if denominator.is_zero() {
            return Err(Error::weight("zero denominator"));
        }
        if numerator.is_zero() {
            return Ok(Self::zero());
        }
        let divisor = gcd(numerator.clone(), denominator.clone());
        Ok(Self {
            num: numerator / &divisor,
            den: denominator / divisor,
        })
    }

    /// Reduced numerator
    pub fn numerator(&self) -> &BigUint {
        &self.num
    }

    /// Reduced denominator, never zero
    pub fn denominator(&self) -> &BigUint {
        &self.den
    }

    /// Both parts as length-prefixed big-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let num = self.num.to_bytes_be();
        let den = self.den.to_bytes_be();
        let mut buf = Vec::with_capacity(num.len() + den.len() + 16);
        buf.extend_from_slice(&(num.len() as u64).to_le_bytes());
        buf.extend_from_slice(&num);
        buf.extend_from_slice(&(den.len() as u64).to_le_bytes());
        buf.extend_from_slice(&den);
        buf
    }
}

impl Add<&Weight> for &Weight {
    type Output = Weight;

    fn add(self, other: &Weight) -> Weight {
        if self.den == other.den {
            return reduce(&self.num + &other.num, self.den.clone());
        }
        reduce(&self.num * &other.den + &other.num * &self.den, &self.den * &other.den)
    }
}

/// Reduce a fraction whose denominator is known to be non-zero
fn reduce(num: BigUint, den: BigUint) -> Weight {
    if num.is_zero() {
        return Weight::zero();
    }
    let divisor = gcd(num.clone(), den.clone());
    Weight {
        num: num / &divisor,
        den: den / divisor,
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for Weight {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.num * &other.den).cmp(&(&other.num * &self.den))
    }
}

impl PartialOrd for Weight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Debug for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Weight({}/{})", self.num, self.den)
    }
}

/// Fork-choice ordering: `Greater` means `a` is preferred over `b`.
///
/// Strictly heavier wins. On an exact tie the lexicographically smaller
/// tipset key wins.
pub fn fork_choice_cmp(a: (&Weight, &TipSetKey), b: (&Weight, &TipSetKey)) -> Ordering {
    a.0.cmp(b.0).then_with(|| b.1.cmp(a.1))
}

/// Pick the preferred head among weighed candidates
pub fn select_head<'a, I>(candidates: I) -> Option<&'a (TipSet, Weight)>
where
    I: IntoIterator<Item = &'a (TipSet, Weight)>,
{
    candidates.into_iter().max_by(|(ts_a, w_a), (ts_b, w_b)| {
        fork_choice_cmp((w_a, &ts_a.key()), (w_b, &ts_b.key()))
    })
}
