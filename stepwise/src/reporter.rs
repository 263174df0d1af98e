//! Run reporting.
//!
//! Every step outcome is reported as one line:
//!
//! ```text
//! apply -- applied schema > widgets -- table widgets not exists
//! apply -- skipped schema > widgets -- column widgets.name not exists
//! apply -- failed schema > backfill -- `always` step failed: no such table: gadgets
//! ```
//!
//! made of the run [`Phase`], the [`Outcome`], the breadcrumb of labels from the root group down
//! to the step, and a message. [`Logger`] emits these lines through `tracing` on the
//! `stepwise::migration` target and keeps the applied/skipped/failed tallies for the run.

use crate::error::Error;
use std::fmt;

const TARGET: &str = "stepwise::migration";
const STACK_SEPARATOR: &str = " > ";

/// The position of a migration in the tree while it is being applied.
///
/// A scope borrows its parent's scope, so walking [`Scope::parent`] goes from a step up through
/// its enclosing groups to the root. It exists only for the duration of an apply.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    label: Option<&'a str>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn root(label: Option<&'a str>) -> Self {
        Self {
            label,
            parent: None,
        }
    }

    pub fn child(&'a self, label: Option<&'a str>) -> Scope<'a> {
        Scope {
            label,
            parent: Some(self),
        }
    }

    pub fn label(&self) -> Option<&'a str> {
        self.label
    }

    pub fn parent(&self) -> Option<&'a Scope<'a>> {
        self.parent
    }

    /// The non-empty labels from the root down to this scope, joined with ` > `.
    pub fn breadcrumb(&self) -> String {
        let mut labels = Vec::new();
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            if let Some(label) = scope.label.filter(|l| !l.is_empty()) {
                labels.push(label);
            }
            cursor = scope.parent;
        }
        labels.reverse();
        labels.join(STACK_SEPARATOR)
    }
}

/// Which pass a run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// A dry run whose changes are rolled back.
    Test,
    #[default]
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Test => f.write_str("test"),
            Phase::Apply => f.write_str("apply"),
        }
    }
}

/// The result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => f.write_str("applied"),
            Outcome::Skipped => f.write_str("skipped"),
            Outcome::Failed => f.write_str("failed"),
        }
    }
}

/// Step tallies for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied {} skipped {} failed",
            self.applied, self.skipped, self.failed
        )
    }
}

/// Receives step outcomes during a run.
///
/// Implementations count what they are told and render it somewhere. A reporter belongs to a
/// single run; the [`Runner`](crate::Runner) hands the same one to every migration in the tree.
pub trait Reporter {
    /// Forget everything from a previous run.
    fn reset(&mut self);

    fn set_phase(&mut self, phase: Phase);

    /// Record an applied step.
    fn applyf(&mut self, at: &Scope<'_>, body: fmt::Arguments<'_>);

    /// Record a skipped step.
    fn skipf(&mut self, at: &Scope<'_>, body: fmt::Arguments<'_>);

    /// Record a failed step and hand the error back unchanged.
    fn error(&mut self, at: &Scope<'_>, err: Error) -> Error;

    /// Emit the final tallies.
    fn write_stats(&mut self);

    fn stats(&self) -> Stats;
}

/// The default [`Reporter`], writing through `tracing`.
#[derive(Debug, Default)]
pub struct Logger {
    phase: Phase,
    result: Option<Outcome>,
    stats: Stats,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The outcome of the most recently reported step.
    pub fn result(&self) -> Option<Outcome> {
        self.result
    }

    /// Render a report line without emitting it.
    pub fn render(&self, outcome: Outcome, at: &Scope<'_>, body: &str) -> String {
        let mut line = format!("{:<5} -- {:<5}", self.phase.to_string(), outcome.to_string());
        let stack = at.breadcrumb();
        if !stack.is_empty() {
            line.push(' ');
            line.push_str(&stack);
        }
        if !body.is_empty() {
            line.push_str(" -- ");
            line.push_str(body);
        }
        line
    }

    fn write(&mut self, outcome: Outcome, at: &Scope<'_>, body: &str) {
        self.result = Some(outcome);
        let line = self.render(outcome, at, body);
        match outcome {
            Outcome::Failed => tracing::error!(
                target: TARGET,
                phase = %self.phase,
                result = %outcome,
                stack = %at.breadcrumb(),
                "{}",
                line
            ),
            _ => tracing::info!(
                target: TARGET,
                phase = %self.phase,
                result = %outcome,
                stack = %at.breadcrumb(),
                "{}",
                line
            ),
        }
    }
}

impl Reporter for Logger {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    fn applyf(&mut self, at: &Scope<'_>, body: fmt::Arguments<'_>) {
        self.stats.applied += 1;
        self.write(Outcome::Applied, at, &body.to_string());
    }

    fn skipf(&mut self, at: &Scope<'_>, body: fmt::Arguments<'_>) {
        self.stats.skipped += 1;
        self.write(Outcome::Skipped, at, &body.to_string());
    }

    fn error(&mut self, at: &Scope<'_>, err: Error) -> Error {
        self.stats.failed += 1;
        self.write(Outcome::Failed, at, &err.to_string());
        err
    }

    fn write_stats(&mut self) {
        tracing::info!(
            target: TARGET,
            applied = self.stats.applied,
            skipped = self.stats.skipped,
            failed = self.stats.failed,
            "{}",
            self.stats
        );
    }

    fn stats(&self) -> Stats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumb_skips_empty_labels() {
        let root = Scope::root(Some("schema"));
        let unlabeled = root.child(None);
        let blank = unlabeled.child(Some(""));
        let step = blank.child(Some("widgets"));
        assert_eq!(step.breadcrumb(), "schema > widgets");
        assert_eq!(step.parent().and_then(|p| p.label()), Some(""));
        assert_eq!(Scope::root(None).breadcrumb(), "");
    }

    #[test]
    fn render_pads_phase_and_result() {
        let mut logger = Logger::new();
        let root = Scope::root(Some("schema"));
        let step = root.child(None);
        assert_eq!(
            logger.render(Outcome::Applied, &step, "table widgets not exists"),
            "apply -- applied schema -- table widgets not exists"
        );

        logger.set_phase(Phase::Test);
        assert_eq!(
            logger.render(Outcome::Skipped, &Scope::root(None), ""),
            "test  -- skipped"
        );
    }

    #[test]
    fn counters_track_outcomes() {
        let mut logger = Logger::new();
        let root = Scope::root(None);
        logger.applyf(&root, format_args!("one"));
        logger.applyf(&root, format_args!("two"));
        logger.skipf(&root, format_args!("three"));
        let err = logger.error(&root, Error::from("four"));

        assert_eq!(err, Error::Generic("four".to_string()));
        assert_eq!(logger.result(), Some(Outcome::Failed));
        assert_eq!(
            logger.stats(),
            Stats {
                applied: 2,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(logger.stats().to_string(), "2 applied 1 skipped 1 failed");
    }

    #[test]
    fn lines_are_emitted_through_tracing() {
        use tracing_test::traced_test;

        #[traced_test]
        fn run_test() {
            let mut logger = Logger::new();
            let root = Scope::root(Some("schema"));
            let step = root.child(Some("widgets"));
            logger.applyf(&step, format_args!("{}", "table widgets not exists"));
            logger.error(&step, Error::from("boom"));
            logger.write_stats();

            assert!(logs_contain(
                "apply -- applied schema > widgets -- table widgets not exists"
            ));
            assert!(logs_contain("apply -- failed schema > widgets -- boom"));
            assert!(logs_contain("1 applied 0 skipped 1 failed"));
        }

        run_test();
    }
}
