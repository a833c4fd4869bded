pub mod inspect;
pub mod merkle;
pub mod proof;
pub mod snapshot;
pub mod verify;
