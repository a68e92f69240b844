//! Passes for the genfsm optimizer
mod combine_cases;
mod optimize_if;
mod remove_unreferenced_states;

pub use combine_cases::CombineCases;
pub use optimize_if::OptimizeIf;
pub use remove_unreferenced_states::{
    RemoveUnreferencedStates, remove_unreferenced,
};
