pub mod cpu;
pub mod hdd;

pub use cpu::CpuTemperature;
pub use hdd::DriveTemperature;
