pub mod energy_api;

pub use energy_api::{ApiResponse, EnergyApi, FetchError, HttpEnergyApi};
