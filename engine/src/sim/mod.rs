pub mod batted_ball;
pub mod pitch;
