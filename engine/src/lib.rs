pub mod game;
pub mod math;
pub mod resource_system;
pub mod sim;
