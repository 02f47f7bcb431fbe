pub mod grid_fields;
pub mod images;
pub mod labels;
pub mod manifolds;
pub mod place_cells;
pub mod points;

pub type Mat = nalgebra::DMatrix<f32>;
