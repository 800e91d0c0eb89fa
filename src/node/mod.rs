mod builder;
mod lifecycle;
mod node;

pub use builder::*;
pub use lifecycle::*;
pub use node::*;

#[cfg(test)]
mod builder_test;
