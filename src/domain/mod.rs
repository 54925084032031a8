pub mod ids;
pub mod offer;
pub mod reservation;
pub mod task;
