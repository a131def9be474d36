pub mod inspect;
pub mod place;
