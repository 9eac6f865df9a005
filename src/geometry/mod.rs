pub mod conversion;
pub mod four_vector;
pub mod geometry;
pub mod gram_schmidt;
pub mod manifold;
pub mod metric;
pub mod point;
pub mod schwarzschild;
pub mod stereographic_coordinates_helper;
pub mod tetrad;
