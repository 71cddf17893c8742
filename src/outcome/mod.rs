mod reconciler;

pub use reconciler::{Measurement, OutcomeReconciler};
