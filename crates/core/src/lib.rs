pub mod accumulator;
pub mod error;
pub mod parse;
pub mod partial;
pub mod pearson;
pub mod results;
pub mod strided;
pub mod upper;

pub use accumulator::MulticolumnAccumulator;
pub use error::{CorrError, Result};
pub use partial::PartialSum;
pub use results::PairResults;
pub use strided::{BlockView, Strided};
pub use upper::{pair_at, pair_index, PairIndex};
