//! Condition and expression evaluation.
//!
//! [`condition`] turns a condition config + the current parameters into a
//! boolean; [`expression`] is the minimal language shared by CALCULATION
//! rules and SCRIPT conditions; [`operators`] holds the value coercion and
//! comparison primitives both build on.

pub mod condition;
pub mod expression;
pub mod operators;

pub use condition::evaluate_condition;
pub use expression::evaluate_expression;
