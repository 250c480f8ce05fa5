//! SIGINT cancellation for an in-flight request.
//!
//! The design note in the distilled spec calls for a self-pipe seeded by a
//! SIGINT handler installed only for the request's duration, polled
//! alongside the transport sockets. `tokio::signal` already implements
//! exactly that internally (a self-pipe feeding an async-aware registry), so
//! a fresh listener acquired at the top of every call and dropped at the end
//! gives the same acquire-drain-restore lifecycle without hand-rolling the
//! pipe ourselves.

#[cfg(unix)]
mod imp {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    /// A SIGINT listener scoped to one request. Acquiring one is the
    /// equivalent of installing the handler and draining stale bytes: a
    /// freshly created listener carries no notifications from before it
    /// existed.
    pub struct CancelGuard {
        signal: Signal,
    }

    impl CancelGuard {
        pub fn new() -> std::io::Result<Self> {
            Ok(CancelGuard { signal: signal(SignalKind::interrupt())? })
        }

        /// Resolves when SIGINT arrives. Cancel-safe: intended for use as
        /// one arm of `tokio::select!`.
        pub async fn cancelled(&mut self) {
            self.signal.recv().await;
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::future::pending;

    /// No-op stand-in on non-Unix targets: the pump/signal machinery this
    /// crate mirrors is POSIX-only, so cancellation simply never fires.
    pub struct CancelGuard;

    impl CancelGuard {
        pub fn new() -> std::io::Result<Self> {
            Ok(CancelGuard)
        }

        pub async fn cancelled(&mut self) {
            pending::<()>().await;
        }
    }
}

pub use imp::CancelGuard;
