use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One marginal-rate tier of a progressive schedule.
///
/// `upper_bound` is `None` for the terminal, unbounded bracket. The lower
/// bound is implied by the previous bracket's upper bound (or zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

impl Bracket {
    pub fn bounded(
        upper_bound: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            upper_bound: Some(upper_bound),
            rate,
        }
    }

    pub fn unbounded(rate: Decimal) -> Self {
        Self {
            upper_bound: None,
            rate,
        }
    }
}

/// Reasons a bracket sequence is not a valid [`BracketTable`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketTableError {
    #[error("bracket table has no brackets")]
    Empty,

    #[error("bracket {index} has non-positive upper bound {bound}")]
    NonPositiveBound { index: usize, bound: Decimal },

    #[error("bracket {index} upper bound {bound} does not exceed the previous bound {previous}")]
    NotIncreasing {
        index: usize,
        bound: Decimal,
        previous: Decimal,
    },

    #[error("bracket {index} is unbounded but is not the last bracket")]
    UnboundedBeforeEnd { index: usize },

    #[error("last bracket must be unbounded")]
    MissingUnboundedTerminal,

    #[error("bracket {index} rate {rate} is outside [0, 1]")]
    RateOutOfRange { index: usize, rate: Decimal },
}

/// An ordered, gapless set of brackets covering `[0, ∞)`.
///
/// Tables are immutable once constructed. Every finite upper bound is
/// positive and strictly greater than the one before it, the last bracket
/// is unbounded, and every rate lies in `[0, 1]`.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::{Bracket, BracketTable};
///
/// let table = BracketTable::new(vec![
///     Bracket::bounded(dec!(10000), dec!(0.10)),
///     Bracket::unbounded(dec!(0.20)),
/// ]);
///
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.top_rate(), dec!(0.20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bracket>", into = "Vec<Bracket>")]
pub struct BracketTable {
    brackets: Vec<Bracket>,
}

impl BracketTable {
    /// Builds a table from compiled-in brackets.
    ///
    /// # Panics
    ///
    /// Panics if the brackets violate any table invariant. Use
    /// [`BracketTable::try_new`] for data read at runtime.
    pub fn new(brackets: Vec<Bracket>) -> Self {
        match Self::try_new(brackets) {
            Ok(table) => table,
            Err(err) => panic!("invalid bracket table: {err}"),
        }
    }

    /// Validates and builds a table.
    ///
    /// # Errors
    ///
    /// Returns [`BracketTableError`] describing the first violated invariant.
    pub fn try_new(brackets: Vec<Bracket>) -> Result<Self, BracketTableError> {
        validate(&brackets)?;
        Ok(Self { brackets })
    }

    /// A single unbounded bracket taxing every unit at `rate`.
    pub fn flat(rate: Decimal) -> Self {
        Self::new(vec![Bracket::unbounded(rate)])
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    /// Always false for a constructed table; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    /// The rate of the lowest bracket.
    pub fn bottom_rate(&self) -> Decimal {
        self.brackets[0].rate
    }

    /// The rate of the unbounded bracket.
    pub fn top_rate(&self) -> Decimal {
        self.brackets[self.brackets.len() - 1].rate
    }

    /// Upper bound of the lowest bracket, or `None` for a flat table.
    pub fn first_upper_bound(&self) -> Option<Decimal> {
        self.brackets[0].upper_bound
    }

    /// Multiplies every finite upper bound by `factor`.
    ///
    /// Several US states derive their joint-filer schedule by doubling the
    /// single-filer bracket widths.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is not positive.
    pub fn scaled(
        &self,
        factor: Decimal,
    ) -> Self {
        assert!(
            factor > Decimal::ZERO,
            "bracket scale factor must be positive, got {factor}"
        );
        let brackets = self
            .brackets
            .iter()
            .map(|b| Bracket {
                upper_bound: b.upper_bound.map(|bound| bound * factor),
                rate: b.rate,
            })
            .collect();
        Self::new(brackets)
    }

    /// Returns a copy with the lowest bracket's upper bound replaced.
    ///
    /// # Errors
    ///
    /// Fails if the table is flat or the new bound breaks ordering.
    pub fn with_first_upper_bound(
        &self,
        bound: Decimal,
    ) -> Result<Self, BracketTableError> {
        if self.brackets[0].upper_bound.is_none() {
            return Err(BracketTableError::UnboundedBeforeEnd { index: 0 });
        }
        let mut brackets = self.brackets.clone();
        brackets[0].upper_bound = Some(bound);
        Self::try_new(brackets)
    }
}

impl TryFrom<Vec<Bracket>> for BracketTable {
    type Error = BracketTableError;

    fn try_from(brackets: Vec<Bracket>) -> Result<Self, Self::Error> {
        Self::try_new(brackets)
    }
}

impl From<BracketTable> for Vec<Bracket> {
    fn from(table: BracketTable) -> Self {
        table.brackets
    }
}

fn validate(brackets: &[Bracket]) -> Result<(), BracketTableError> {
    if brackets.is_empty() {
        return Err(BracketTableError::Empty);
    }

    let last = brackets.len() - 1;
    let mut previous = Decimal::ZERO;

    for (index, bracket) in brackets.iter().enumerate() {
        if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
            return Err(BracketTableError::RateOutOfRange {
                index,
                rate: bracket.rate,
            });
        }

        match bracket.upper_bound {
            None if index != last => {
                return Err(BracketTableError::UnboundedBeforeEnd { index });
            }
            None => {}
            Some(_) if index == last => {
                return Err(BracketTableError::MissingUnboundedTerminal);
            }
            Some(bound) if bound <= Decimal::ZERO => {
                return Err(BracketTableError::NonPositiveBound { index, bound });
            }
            Some(bound) if bound <= previous => {
                return Err(BracketTableError::NotIncreasing {
                    index,
                    bound,
                    previous,
                });
            }
            Some(bound) => previous = bound,
        }
    }

    Ok(())
}
