pub mod fixture;
pub mod fleet;

pub use fixture::{TestStore, same_contents, scenario_attrs, short_attrs};
pub use fleet::TestFleet;
