pub mod guard;
pub mod normalize;
pub mod rules;
pub mod session;
pub mod source;
