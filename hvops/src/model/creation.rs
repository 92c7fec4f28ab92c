use core::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::commands::DEFAULT_SWITCH_NAME;

/// Transport used by enhanced session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnhancedSessionTransport {
    #[default]
    #[serde(alias = "vmbus")]
    VMBus,
    #[serde(alias = "hvsocket")]
    HvSocket,
}

impl fmt::Display for EnhancedSessionTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnhancedSessionTransport::VMBus => write!(f, "VMBus"),
            EnhancedSessionTransport::HvSocket => write!(f, "HvSocket"),
        }
    }
}

/// Input for creating a virtual machine around an existing disk image.
///
/// Only the name, generation, disk and switch are required for the
/// machine to exist; the remaining settings are applied afterwards on a
/// best-effort basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationParameters {
    pub name: String,
    #[serde(default = "default_generation")]
    pub generation: u32,
    pub vhd_path: String,
    #[serde(default = "default_switch_name")]
    pub switch_name: String,
    #[serde(default = "default_processor_count")]
    pub processor_count: u32,
    #[serde(default)]
    pub memory_startup_bytes: u64,
    #[serde(default = "default_secure_boot")]
    pub secure_boot: bool,
    #[serde(default)]
    pub enhanced_session_transport: EnhancedSessionTransport,
}

fn default_generation() -> u32 {
    2
}

fn default_switch_name() -> String {
    DEFAULT_SWITCH_NAME.to_string()
}

fn default_processor_count() -> u32 {
    1
}

fn default_secure_boot() -> bool {
    true
}

impl CreationParameters {
    pub fn new(name: impl Into<String>, vhd_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generation: default_generation(),
            vhd_path: vhd_path.into(),
            switch_name: default_switch_name(),
            processor_count: default_processor_count(),
            memory_startup_bytes: 0,
            secure_boot: default_secure_boot(),
            enhanced_session_transport: EnhancedSessionTransport::default(),
        }
    }
}
