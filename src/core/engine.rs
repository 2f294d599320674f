use crate::domain::ports::LockSession;
use crate::utils::error::Result;
use std::time::Instant;

pub struct LockEngine<S: LockSession> {
    session: S,
}

impl<S: LockSession> LockEngine<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    /// Runs acquire, work and release. If `work` fails the lock is still
    /// released and the work error is returned.
    pub async fn run(&mut self) -> Result<S::Output> {
        let started = Instant::now();

        tracing::info!("🔒 Acquiring lock...");
        self.session.acquire().await?;
        tracing::info!("Lock acquired after {:?}", started.elapsed());

        let output = match self.session.work().await {
            Ok(output) => output,
            Err(e) => {
                if let Err(release_err) = self.session.release().await {
                    tracing::warn!("Release after failed work also failed: {}", release_err);
                }
                return Err(e);
            }
        };

        self.session.release().await?;
        tracing::info!("🔓 Lock released, total {:?}", started.elapsed());

        Ok(output)
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::FlockError;
    use async_trait::async_trait;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_work: bool,
    }

    #[async_trait]
    impl LockSession for Recorder {
        type Output = usize;

        async fn acquire(&mut self) -> Result<()> {
            self.calls.push("acquire");
            Ok(())
        }

        async fn work(&mut self) -> Result<usize> {
            self.calls.push("work");
            if self.fail_work {
                return Err(FlockError::NotOpenError {
                    path: PathBuf::from("x"),
                });
            }
            Ok(self.calls.len())
        }

        async fn release(&mut self) -> Result<()> {
            self.calls.push("release");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let mut engine = LockEngine::new(Recorder::default());
        assert_eq!(engine.run().await.unwrap(), 2);
        assert_eq!(engine.session().calls, vec!["acquire", "work", "release"]);
    }

    #[tokio::test]
    async fn test_release_runs_after_failed_work() {
        let mut engine = LockEngine::new(Recorder {
            fail_work: true,
            ..Default::default()
        });
        assert!(matches!(
            engine.run().await,
            Err(FlockError::NotOpenError { .. })
        ));
        assert_eq!(
            engine.into_session().calls,
            vec!["acquire", "work", "release"]
        );
    }
}
