//! Cross-crate end-to-end tests for the Lumina compiler pipeline.

#[cfg(test)]
pub(crate) mod utils;

#[cfg(test)]
mod codegen;
#[cfg(test)]
mod pipeline;
#[cfg(test)]
mod project;
#[cfg(test)]
mod ssa;
