pub mod echo;
pub mod expander;
pub mod indicate;
pub mod orchestrate;
pub mod sonar;
