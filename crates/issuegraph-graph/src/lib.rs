pub mod analyzer;
pub mod builder;
pub mod centrality;
pub mod cycles;
pub mod metrics;
pub mod stats;
pub mod structure;

pub use analyzer::*;
pub use builder::*;
pub use centrality::*;
pub use cycles::*;
pub use metrics::*;
pub use stats::*;
pub use structure::*;
