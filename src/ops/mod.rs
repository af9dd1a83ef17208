pub mod fill;
pub mod shapes;
pub mod stroke;
pub mod text;
pub mod transform;
