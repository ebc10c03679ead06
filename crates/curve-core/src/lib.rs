pub mod align;
pub mod error;
pub mod tracker;
pub mod traits;
pub mod types;

pub use align::{align, SeriesAligner};
pub use error::*;
pub use tracker::{CheckOutcome, CheckStatus, CurveStateTracker, TiePolicy, TrackerConfig};
pub use traits::*;
pub use types::*;
