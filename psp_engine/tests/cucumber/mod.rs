mod psp_world;
mod setups;
mod steps;

pub use psp_world::PspWorld;
