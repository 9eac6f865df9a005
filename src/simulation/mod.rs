pub mod entity;
pub mod particle;
pub mod trajectory;
