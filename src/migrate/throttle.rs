use std::time::Duration;

/// Fixed pause between consecutive remote calls. Callers await it in
/// sequence, which is what keeps a run under the workspace rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
