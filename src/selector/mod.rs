//! Replica selection among servers holding the same segment
//!
//! Every segment tracked by the timeline carries a [`ServerSelector`] holding
//! the current candidate servers for that segment. Picking one candidate for a
//! query goes through a [`ServerSelectorStrategy`]; the stock strategies are
//! random choice and tier-priority grouping around an inner strategy.

mod server_selector;
mod strategy;

pub use server_selector::ServerSelector;
pub use strategy::{
    HighestPriorityTierSelectorStrategy, LowestPriorityTierSelectorStrategy,
    RandomServerSelectorStrategy, ServerSelectorStrategy,
};
