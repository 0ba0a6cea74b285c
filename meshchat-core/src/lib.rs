pub mod config;
pub mod core_chat;
pub mod core_crypto;
pub mod core_graph;
pub mod core_identity;
pub mod logging;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use core_chat::{ChatClient, ChatError, ChatEvent, ChatResult};
pub use core_crypto::{CryptoProvider, DalekCrypto};
pub use core_graph::{GraphStore, MemoryGraph};
pub use core_identity::{Identity, IdentityManager, Session};
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Ensure the main exports are accessible
        let _ = LogLevel::Info;
        let _ = Config::default();
    }
}
