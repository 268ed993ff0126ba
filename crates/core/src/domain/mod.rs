mod arg;
mod auction;
mod manifest;
mod module;
mod names;

pub use arg::Arg;
pub use auction::{AuctionLabel, Phase};
pub use manifest::{DeploymentManifest, DeploymentRecord};
pub use module::{LinkSlot, ModuleDefinition, ADDRESS_LEN};
pub use names::{full_name, RegistrationKind, RegistrationNames};
