pub mod label;
pub mod round;

pub use label::Label;
pub use round::{Channel, RoundEvent, RoundRecord};
