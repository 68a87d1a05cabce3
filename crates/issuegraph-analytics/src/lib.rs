pub mod impact;
pub mod labels;
pub mod recommend;
pub mod signals;
pub mod triage;
pub mod unblocks;
pub mod velocity;

pub use impact::*;
pub use labels::*;
pub use recommend::*;
pub use signals::*;
pub use triage::*;
pub use unblocks::*;
pub use velocity::*;
