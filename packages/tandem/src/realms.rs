//! Wiring of the app context and the privileged context.

use std::sync::Arc;

use tandem_bridge::{
    channel, CapabilityServer, Dispatcher, EventEmitter, RegistrationHandle,
    RemoteCapabilitySurface,
};
use tandem_core::{register_base_classes, ConfigRegistry, Configurator, TreeChanged};
use tandem_widgets::{register_widgets, MapsAddon, MapsSdk};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::TandemConfig;
use crate::error::Result;

/// Both contexts of one running application.
///
/// The app side gets the [`Configurator`] (with every base and widget class
/// registered) and the [`Dispatcher`]; the privileged side gets the
/// [`RemoteCapabilitySurface`] and an [`EventEmitter`]. The channel between
/// them is created here and nowhere else.
pub struct Realms {
    config: TandemConfig,
    configurator: Configurator,
    dispatcher: Dispatcher,
    surface: Arc<RemoteCapabilitySurface>,
    events: EventEmitter,
    updates: Option<mpsc::UnboundedReceiver<TreeChanged>>,
    server: JoinHandle<()>,
}

impl Realms {
    /// Create the channel and start serving the privileged surface. Must be
    /// called from within a tokio runtime.
    pub fn connect(config: TandemConfig) -> Self {
        let (app, main) = channel::pair();

        let surface = RemoteCapabilitySurface::new();
        let server = CapabilityServer::new(Arc::clone(&surface), main, config.bridge.clone());
        let events = server.events();
        let server = server.spawn();

        let dispatcher = Dispatcher::spawn(app, config.bridge.clone());

        let registry = ConfigRegistry::new();
        register_base_classes(&registry);
        register_widgets(&registry);
        let (sink, updates) = mpsc::unbounded_channel();
        let configurator = Configurator::new(registry)
            .with_config(config.reactive.clone())
            .with_sink(sink);

        debug!("realms connected");
        Self {
            config,
            configurator,
            dispatcher,
            surface,
            events,
            updates: Some(updates),
            server,
        }
    }

    pub fn config(&self) -> &TandemConfig {
        &self.config
    }

    pub fn configurator(&self) -> &Configurator {
        &self.configurator
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn surface(&self) -> &Arc<RemoteCapabilitySurface> {
        &self.surface
    }

    /// An emitter for privileged objects that push events to the app.
    pub fn events(&self) -> EventEmitter {
        self.events.clone()
    }

    /// The tree-change notifications of every component built by
    /// [`configurator`](Self::configurator). Can be taken once.
    pub fn take_updates(&mut self) -> Option<mpsc::UnboundedReceiver<TreeChanged>> {
        self.updates.take()
    }

    /// Create the maps addon on the privileged side and register it.
    pub fn install_maps(
        &self,
        sdk: Arc<dyn MapsSdk>,
    ) -> Result<(Arc<MapsAddon>, RegistrationHandle)> {
        let addon = MapsAddon::new(sdk, self.events());
        let registration = addon.register(&self.surface)?;
        Ok((addon, registration))
    }

    /// Close the channel and wait for the privileged side to stop.
    /// Pending calls fail with `ChannelClosed`.
    pub async fn shutdown(self) {
        self.dispatcher.close();
        if let Err(e) = self.server.await {
            warn!(error = %e, "capability server task failed");
        }
        debug!("realms shut down");
    }
}

impl std::fmt::Debug for Realms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realms")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("namespaces", &self.surface.namespaces())
            .finish_non_exhaustive()
    }
}
