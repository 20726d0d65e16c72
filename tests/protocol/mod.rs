//! Protocol module tests.

mod classifier_test;
mod filter_test;
