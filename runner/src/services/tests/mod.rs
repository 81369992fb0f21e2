//! Service-specific tests
//!
//! Supervision tests spawn real `/bin/sh` children on a pseudo-terminal.
//! The `common` fakes are shared with the core tests.


// Common test utilities for services
#[cfg(test)]
pub mod common {
    use std::collections::{HashMap, HashSet};
    use std::io::{self, Write};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{RunnerError, RunnerResult};
    use crate::services::supervisor::LineEcho;
    use crate::traits::{
        CapturedOutput, ExitDisposition, Invocation, OutputObserver, ProcessSupervisor, TestEnvironment,
    };

    /// Environment with just enough for `/bin/sh` scripts
    pub fn shell_environment() -> TestEnvironment {
        let mut environment = TestEnvironment::default();
        environment
            .vars
            .insert("PATH".into(), std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".into()));
        environment
    }

    /// In-memory sink readable after a [`LineEcho`] wrote to it
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn echo() -> (LineEcho, SharedBuffer) {
            let buffer = SharedBuffer::default();
            (LineEcho::new(Box::new(buffer.clone())), buffer)
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedInvocation {
        pub program: PathBuf,
        pub args: Vec<String>,
        pub timeout: Duration,
    }

    /// Scripted supervisor keyed by the last argument of each invocation
    ///
    /// For list-then-filter binaries that is the filter flag, for the single
    /// process launcher it is the binary path.
    pub struct FakeSupervisor {
        listing: CapturedOutput,
        dispositions: HashMap<String, ExitDisposition>,
        outputs: HashMap<String, Vec<String>>,
        spawn_failures: HashSet<String>,
        invocations: Mutex<Vec<RecordedInvocation>>,
        timeouts: AtomicUsize,
    }

    impl FakeSupervisor {
        pub fn new(listing: CapturedOutput) -> Self {
            Self {
                listing,
                dispositions: HashMap::new(),
                outputs: HashMap::new(),
                spawn_failures: HashSet::new(),
                invocations: Mutex::new(Vec::new()),
                timeouts: AtomicUsize::new(0),
            }
        }

        pub fn with_disposition(mut self, key: &str, disposition: ExitDisposition) -> Self {
            self.dispositions.insert(key.to_string(), disposition);
            self
        }

        pub fn with_output(mut self, key: &str, lines: &[&str]) -> Self {
            self.outputs
                .insert(key.to_string(), lines.iter().map(|line| line.to_string()).collect());
            self
        }

        pub fn with_spawn_failure(mut self, key: &str) -> Self {
            self.spawn_failures.insert(key.to_string());
            self
        }

        pub fn invocations(&self) -> Vec<RecordedInvocation> {
            self.invocations.lock().unwrap().clone()
        }

        pub fn invoked_args(&self) -> Vec<Vec<String>> {
            self.invocations().into_iter().map(|invocation| invocation.args).collect()
        }

        pub fn timeouts_signalled(&self) -> usize {
            self.timeouts.load(Ordering::SeqCst)
        }

        fn record(&self, invocation: &Invocation<'_>) -> RunnerResult<String> {
            self.invocations.lock().unwrap().push(RecordedInvocation {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                timeout: invocation.timeout,
            });
            let key = invocation.args.last().cloned().unwrap_or_default();
            if self.spawn_failures.contains(&key) {
                return Err(RunnerError::SpawnFailed {
                    program: invocation.program_name(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
            Ok(key)
        }
    }

    #[async_trait]
    impl ProcessSupervisor for FakeSupervisor {
        async fn supervise(
            &self,
            invocation: &Invocation<'_>,
            observer: &mut dyn OutputObserver,
        ) -> RunnerResult<ExitDisposition> {
            let key = self.record(invocation)?;
            for line in self.outputs.get(&key).into_iter().flatten() {
                observer.on_line(line);
            }
            let disposition = self.dispositions.get(&key).copied().unwrap_or(ExitDisposition::Exited(0));
            if disposition == ExitDisposition::TimedOut {
                self.timeouts.fetch_add(1, Ordering::SeqCst);
                observer.on_timeout();
            }
            Ok(disposition)
        }

        async fn capture(&self, invocation: &Invocation<'_>) -> RunnerResult<CapturedOutput> {
            self.record(invocation)?;
            Ok(self.listing.clone())
        }
    }
}
