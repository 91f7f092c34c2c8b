pub mod assessment;
pub mod attendance;
pub mod enums;
pub mod note;
pub mod patient;
pub mod review;

pub use assessment::*;
pub use attendance::*;
pub use note::*;
pub use patient::*;
pub use review::*;
