mod aggregate;
mod driver;
mod site;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::TagAggregator;
pub use driver::{Pipeline, RunReport, TagOutcome, TagSuccess};
pub use site::Site;
