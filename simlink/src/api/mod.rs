mod logging;
mod settings;

pub use logging::VehicleLogging;
pub use settings::Settings;
