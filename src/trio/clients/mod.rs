//! Provider specific [`CompletionProvider`](crate::completion::CompletionProvider) implementations.
//!
//! Each submodule offers a concrete client that speaks a particular vendor's API while
//! conforming to the uniform completion contract.

pub mod gemini;
