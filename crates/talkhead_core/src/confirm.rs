use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::Mutex;

use crate::CostEstimate;

/// Approves or declines a billable operation. Implementations must decline
/// whenever the answer is anything short of an explicit yes.
pub trait ConfirmationProvider: Send + Sync {
    fn confirm(&self, estimate: &CostEstimate) -> bool;
}

/// The gate in front of every paid call. `auto_approve` skips the provider entirely.
pub fn confirm(
    estimate: &CostEstimate,
    auto_approve: bool,
    provider: &dyn ConfirmationProvider,
) -> bool {
    if auto_approve {
        return true;
    }
    provider.confirm(estimate)
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Interactive prompt over any line reader; `stdio()` binds it to the terminal.
pub struct ConsolePrompt<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl ConsolePrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> ConsolePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    /// Consumes the prompt and hands back the output sink, for inspecting what was shown.
    pub fn into_output(self) -> Option<W> {
        self.output.into_inner().ok()
    }

    fn ask(&self, estimate: &CostEstimate) -> io::Result<String> {
        if let Ok(mut out) = self.output.lock() {
            writeln!(out, "Estimated cost: {estimate}")?;
            write!(out, "Proceed with the paid render? [y/N] ")?;
            out.flush()?;
        }
        let mut line = String::new();
        let mut input = self
            .input
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "prompt input poisoned"))?;
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no answer"));
        }
        Ok(line)
    }
}

impl<R, W> ConfirmationProvider for ConsolePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm(&self, estimate: &CostEstimate) -> bool {
        match self.ask(estimate) {
            Ok(answer) => is_affirmative(&answer),
            Err(_) => false,
        }
    }
}

/// Non-interactive approval for automated runs: yes only when the estimate fits the ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetCeiling {
    max_total: f64,
}

impl BudgetCeiling {
    pub fn new(max_total: f64) -> Self {
        Self { max_total }
    }
}

impl ConfirmationProvider for BudgetCeiling {
    fn confirm(&self, estimate: &CostEstimate) -> bool {
        self.max_total.is_finite() && estimate.total() <= self.max_total
    }
}
