//! Server application state

use std::sync::Arc;

use crate::forge::Compiler;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    compiler: Arc<dyn Compiler>,
}

impl AppState {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self { compiler }
    }

    pub fn compiler(&self) -> Arc<dyn Compiler> {
        self.compiler.clone()
    }
}
