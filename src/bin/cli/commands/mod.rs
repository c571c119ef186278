pub mod learn;
pub mod leech;
pub mod maintenance;
pub mod preview;
pub mod review;
pub mod stats;
