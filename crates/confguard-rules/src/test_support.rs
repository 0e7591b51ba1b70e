use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Counts process-level warnings. Entries mirrored from an evaluation log are left out.
struct WarningCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == Level::WARN && metadata.target() != "confguard::evaluation" {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Runs `f` and returns how many process-level warnings it emitted.
pub(crate) fn count_warnings(f: impl FnOnce()) -> usize {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarningCounter(Arc::clone(&count)));
    tracing::subscriber::with_default(subscriber, f);
    count.load(Ordering::SeqCst)
}
