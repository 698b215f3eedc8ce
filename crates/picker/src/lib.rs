pub mod picker;
pub mod resolver;

#[cfg(test)]
mod fakes;

pub use picker::{
    LIST_ATTEMPTS, PickRequest, PickResult, Picker, RATED_ATTEMPTS, UNWATCHED_ATTEMPTS,
};
pub use resolver::{Candidate, Resolver};
