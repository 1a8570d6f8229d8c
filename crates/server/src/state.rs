use std::sync::Arc;

use depot_core::broker::MemoryBroker;
use depot_core::control::PipelineController;
use depot_core::deposit::DepositStore;
use depot_core::pipeline::PipelineSwitch;
use depot_core::Config;

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn DepositStore>,
    broker: MemoryBroker,
    controller: Arc<PipelineController>,
    switch: Arc<PipelineSwitch>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DepositStore>,
        broker: MemoryBroker,
        controller: Arc<PipelineController>,
        switch: Arc<PipelineSwitch>,
    ) -> Self {
        Self {
            config,
            store,
            broker,
            controller,
            switch,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn DepositStore {
        self.store.as_ref()
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    pub fn controller(&self) -> &PipelineController {
        &self.controller
    }

    pub fn switch(&self) -> &PipelineSwitch {
        &self.switch
    }
}
