use std::sync::{PoisonError, RwLock};

use shared::domain::Viewport;

/// Window dimensions, sampled at each capture and each scatter.
pub trait ViewportSource: Send + Sync {
    fn current(&self) -> Viewport;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedViewport(pub Viewport);

impl ViewportSource for FixedViewport {
    fn current(&self) -> Viewport {
        self.0
    }
}

#[derive(Debug)]
pub struct SharedViewport {
    inner: RwLock<Viewport>,
}

impl SharedViewport {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: RwLock::new(viewport),
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Viewport::new(width, height);
    }
}

impl ViewportSource for SharedViewport {
    fn current(&self) -> Viewport {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
