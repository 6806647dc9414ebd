mod bracket;
mod calculation;
mod jurisdiction;
mod residency;

pub use bracket::{Bracket, BracketTable, BracketTableError};
pub use calculation::{BracketContribution, CalculationResult};
pub use jurisdiction::{FilerCategory, IdentifierError, Jurisdiction, TaxYear};
pub use residency::{Residency, ResidencyClass, ResidencyError};
