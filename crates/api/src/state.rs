//! Application state shared by all HTTP and WebSocket handlers

use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::bridge::ControlBridge;
use crate::config::Config;
use crate::websocket::RelayState;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<IdentityVerifier>,
    pub relay: RelayState,
    pub bridge: ControlBridge,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// The control bridge starts detached; call [`AppState::attach_bridge`] once
    /// the relay is ready to serve.
    pub fn new(config: Config) -> Self {
        let verifier = IdentityVerifier::from_config(&config);
        let relay = RelayState::new().with_close_superseded(config.close_superseded_connections);

        Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            relay,
            bridge: ControlBridge::new(),
        }
    }

    /// Connect the control bridge to the relay's broadcast router
    pub fn attach_bridge(&self) -> bool {
        self.bridge.attach(self.relay.router().clone())
    }
}
