pub mod artifact;
pub mod capability;
pub mod session;
pub mod slot;
