//! Scripted engine for tests

use std::sync::{Arc, Mutex};

use super::engine::{EngineConfig, EngineError, EngineFactory, EngineSink, RecognitionEngine};

/// Everything the fake engines were asked to do
#[derive(Debug, Default)]
pub struct FakeLog {
    pub created: Vec<EngineConfig>,
    pub sinks: Vec<EngineSink>,
    pub starts: usize,
    pub stops: usize,
}

pub struct FakeFactory {
    log: Arc<Mutex<FakeLog>>,
    supported: bool,
    deny_permission: bool,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(FakeLog::default())),
            supported: true,
            deny_permission: false,
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn denying_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<FakeLog>> {
        Arc::clone(&self.log)
    }
}

impl EngineFactory for FakeFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(
        &self,
        config: EngineConfig,
        sink: EngineSink,
    ) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        if !self.supported {
            return Err(EngineError::Unsupported);
        }
        let mut log = self.log.lock().unwrap();
        log.created.push(config);
        log.sinks.push(sink);

        Ok(Box::new(FakeEngine {
            log: Arc::clone(&self.log),
            deny_permission: self.deny_permission,
        }))
    }
}

struct FakeEngine {
    log: Arc<Mutex<FakeLog>>,
    deny_permission: bool,
}

impl RecognitionEngine for FakeEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        self.log.lock().unwrap().starts += 1;
        if self.deny_permission {
            return Err(EngineError::PermissionDenied);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }
}
