use burn::train::renderer::{MetricState, MetricsRenderer, TrainingProgress};
use derive_new::new;

/// A renderer for TUI-disabled modes which reports progress through the logger
#[derive(new)]
pub struct Simple {}

impl Simple {
    fn report(&self, phase: &str, item: &TrainingProgress) {
        log::info!(
            "[{}] epoch {}/{} - iteration {} - {}/{} items",
            phase,
            item.epoch,
            item.epoch_total,
            item.iteration,
            item.progress.items_processed,
            item.progress.items_total,
        );
    }

    fn metric(&self, phase: &str, state: MetricState) {
        match state {
            MetricState::Generic(entry) => log::debug!("[{}] {}", phase, entry.formatted),
            MetricState::Numeric(entry, value) => {
                log::debug!("[{}] {}: {:.4}", phase, entry.name, value)
            }
        }
    }
}

impl MetricsRenderer for Simple {
    fn update_train(&mut self, state: MetricState) {
        self.metric("train", state);
    }

    fn update_valid(&mut self, state: MetricState) {
        self.metric("valid", state);
    }

    fn render_train(&mut self, item: TrainingProgress) {
        self.report("train", &item);
    }

    fn render_valid(&mut self, item: TrainingProgress) {
        self.report("valid", &item);
    }
}
