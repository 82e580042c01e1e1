pub mod bridge;
pub mod camera;
pub mod geometry;
pub mod io;
pub mod publish;
pub mod resolve;
pub mod state;
pub mod system;
pub mod viz;
