pub mod model;
pub mod palette;
pub mod parsers;
pub mod provider;
pub mod transforms;
